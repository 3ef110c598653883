//! The Conceptual Model Builder: keyword in, artifact set out.
//!
//! One long-lived cooperative task that suspends at each external call.
//! The policy chooses actions; the Builder executes them, maintains the
//! model, enforces the bounds, and performs emission — so everything except
//! the policy's choices is deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use url::Url;

use conceptscribe_browser::{ToolProvider, normalize_url};
use conceptscribe_emit::{FileSink, emit_concept_set};
use conceptscribe_reasoner::{Decision, Policy, PolicyState};
use conceptscribe_session::SessionStore;
use conceptscribe_shared::{
    PageText, Result, RunLimits, RunPhase, RunResult, ScribeError, SearchHit, Topic,
};

use crate::model::ConceptualModel;

/// Attempts per policy call when the error is transient.
const RETRY_ATTEMPTS: usize = 2;

/// Longest page observation replayed to the policy, in characters.
const MAX_OBSERVATION_CHARS: usize = 6_000;

/// Links surfaced per page observation.
const MAX_OBSERVATION_LINKS: usize = 20;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag, checked between suspension points.
///
/// A long-running tool call cannot be interrupted mid-flight; cancellation
/// takes effect before the next call is issued. Already-written artifacts
/// remain on disk.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a page is visited during the crawl.
    fn page_visited(&self, url: &str, current: usize, budget: usize);
    /// Called when a concept is recorded or extended.
    fn concept_recorded(&self, name: &str, total: usize);
    /// Called when the run completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_visited(&self, _url: &str, _current: usize, _budget: usize) {}
    fn concept_recorded(&self, _name: &str, _total: usize) {}
    fn done(&self, _result: &RunResult) {}
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Drives a bounded research loop from a [`Topic`] to a complete,
/// invariant-satisfying artifact set.
pub struct Builder<P: ToolProvider, L: Policy> {
    provider: P,
    policy: L,
    session: SessionStore,
    sink: FileSink,
    limits: RunLimits,
    /// URL of the llms.txt specification reference.
    reference_url: String,
    cancel: CancelFlag,
}

impl<P: ToolProvider, L: Policy> Builder<P, L> {
    pub fn new(
        provider: P,
        policy: L,
        session: SessionStore,
        sink: FileSink,
        limits: RunLimits,
        reference_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            policy,
            session,
            sink,
            limits,
            reference_url: reference_url.into(),
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for cancelling this run between suspension points.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run the research loop to completion.
    ///
    /// The provider is released on every exit path, success or failure.
    #[instrument(skip_all, fields(keyword = %topic.keyword))]
    pub async fn run(mut self, topic: &Topic, progress: &dyn ProgressReporter) -> Result<RunResult> {
        let result = self.run_inner(topic, progress).await;
        if let Err(e) = self.provider.close().await {
            warn!(error = %e, "provider close failed");
        }
        if let Ok(run) = &result {
            progress.done(run);
        }
        result
    }

    async fn run_inner(
        &mut self,
        topic: &Topic,
        progress: &dyn ProgressReporter,
    ) -> Result<RunResult> {
        let start = Instant::now();
        let session_id = SessionStore::new_session_id();

        info!(%session_id, out = %topic.output_folder.display(), "starting research run");
        self.record_turn(&session_id, "user", &format!("research topic: {}", topic.keyword))
            .await;

        // --- Reference phase ---
        progress.phase("Checking specification reference");
        let reference_outline = self.fetch_reference().await;
        let reference_degraded = reference_outline.is_none();

        let mut model = ConceptualModel::new();
        let mut phase = RunPhase::Discover;
        let mut steps = 0usize;
        let mut observation = if reference_degraded {
            "The llms.txt specification reference could not be retrieved; \
             follow the conventional structure from memory."
                .to_string()
        } else {
            "Specification reference loaded.".to_string()
        };

        progress.phase("Researching");

        // --- Discover / Crawl ⇄ Synthesize loop ---
        loop {
            if self.cancel.is_cancelled() {
                return Err(ScribeError::Cancelled);
            }
            if steps >= self.limits.max_steps {
                return Err(ScribeError::ReasoningExhausted { steps });
            }

            let names = model.names().to_vec();
            let state = PolicyState {
                keyword: &topic.keyword,
                phase,
                reference_outline: reference_outline.as_deref(),
                observation: &observation,
                concept_names: &names,
                pages_visited: model.pages_visited(),
                max_pages: self.limits.max_pages,
                steps_taken: steps,
                max_steps: self.limits.max_steps,
            };

            let decision = self.decide_with_retry(&state).await?;
            steps += 1;
            self.record_turn(&session_id, "assistant", &describe_decision(&decision))
                .await;

            match decision {
                Decision::Search { query } => {
                    phase = RunPhase::Discover;
                    observation = match self.provider.search(&query).await {
                        Ok(hits) => search_observation(&query, &hits),
                        Err(e) if e.is_page_local() => {
                            warn!(error = %e, "search failed, continuing");
                            format!("Search failed: {e}. Try a different query.")
                        }
                        Err(e) => return Err(e),
                    };
                }

                Decision::Visit { url } => {
                    // The page-visit bound is the crawl loop's exit
                    // condition: proceed to emission rather than visiting.
                    if model.pages_visited() >= self.limits.max_pages {
                        info!(
                            pages = model.pages_visited(),
                            "page budget reached, proceeding to emission"
                        );
                        break;
                    }
                    phase = RunPhase::Crawl;
                    observation = self.visit_page(&url, &mut model, progress).await?;
                }

                Decision::Record { concepts } => {
                    phase = RunPhase::Synthesize;
                    let mut recorded = Vec::with_capacity(concepts.len());
                    for draft in concepts {
                        let name = draft.name.clone();
                        let was_new = model.record(draft);
                        progress.concept_recorded(&name, model.concepts().len());
                        debug!(%name, was_new, "concept recorded");
                        recorded.push(name);
                    }
                    observation = format!(
                        "Recorded: {}. Model now holds {} concept(s): {}.",
                        recorded.join(", "),
                        model.concepts().len(),
                        model.names().join(", "),
                    );
                }

                Decision::Finish => {
                    debug!("policy judged coverage sufficient");
                    break;
                }
            }

            self.record_turn(&session_id, "tool", &observation).await;
        }

        // --- Emission phase ---
        if self.cancel.is_cancelled() {
            return Err(ScribeError::Cancelled);
        }
        progress.phase("Emitting artifacts");

        let summary = format!(
            "Conceptual model of {}, synthesized from {} documentation page(s).",
            topic.keyword,
            model.pages_visited()
        );
        let emitted = emit_concept_set(&self.sink, &topic.keyword, &summary, model.concepts())?;

        self.record_turn(
            &session_id,
            "assistant",
            &format!(
                "emitted {} concept file(s) and llms.txt to {}",
                model.concepts().len(),
                self.sink.root().display()
            ),
        )
        .await;

        let transcript_turns = self.session.turn_count(&session_id).await.unwrap_or(0);

        let result = RunResult {
            session_id,
            output_folder: topic.output_folder.clone(),
            index_path: emitted.index_path,
            concept_count: model.concepts().len(),
            pages_visited: model.pages_visited(),
            steps_taken: steps,
            reference_degraded,
            transcript_turns,
            elapsed: start.elapsed(),
        };

        info!(
            concepts = result.concept_count,
            pages = result.pages_visited,
            steps = result.steps_taken,
            elapsed_ms = result.elapsed.as_millis(),
            "research run complete"
        );

        Ok(result)
    }

    /// Fetch and parse the specification reference. Non-fatal: any failure
    /// degrades to `None` and the run proceeds best-effort.
    async fn fetch_reference(&self) -> Option<String> {
        let reference_url = self.reference_url.clone();
        let result: Result<String> = async {
            let handle = self.provider.navigate(&reference_url).await?;
            let page = self.provider.read_content(&handle).await?;
            let parsed = conceptscribe_llmstxt::parse_llms_txt(&page.markdown)?;
            Ok(parsed.outline())
        }
        .await;

        match result {
            Ok(outline) => {
                debug!(url = %reference_url, "specification reference loaded");
                Some(outline)
            }
            Err(e) => {
                let e = ScribeError::ReferenceUnavailable(e.to_string());
                warn!(url = %reference_url, error = %e, "proceeding without reference");
                None
            }
        }
    }

    /// One policy call, retried on transient errors. Retries restart the
    /// current decision only; accumulated model state is untouched.
    async fn decide_with_retry(&mut self, state: &PolicyState<'_>) -> Result<Decision> {
        let mut attempt = 1;
        loop {
            match self.policy.choose_next_action(state).await {
                Ok(decision) => return Ok(decision),
                Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                    warn!(error = %e, attempt, "transient policy error, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Visit one page. Per-page failures are recovered locally: the page is
    /// skipped and the failure becomes the next observation.
    async fn visit_page(
        &mut self,
        url: &str,
        model: &mut ConceptualModel,
        progress: &dyn ProgressReporter,
    ) -> Result<String> {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => return Ok(format!("Invalid URL {url}: {e}. Choose another page.")),
        };

        let normalized = normalize_url(&parsed);
        if model.in_frontier(&normalized) {
            return Ok(format!("Already visited {url}; choose a page not seen before."));
        }

        model.mark_visited(&normalized);
        progress.page_visited(url, model.pages_visited(), self.limits.max_pages);

        let page = async {
            let handle = self.provider.navigate(url).await?;
            self.provider.read_content(&handle).await
        }
        .await;

        match page {
            Ok(page) => Ok(page_observation(&page)),
            Err(e) if e.is_page_local() => {
                warn!(%url, error = %e, "page skipped");
                Ok(format!("Page {url} could not be used: {e}. It was skipped."))
            }
            Err(e) => Err(e),
        }
    }

    /// Append a transcript turn; store failures are logged, not fatal.
    async fn record_turn(&self, session_id: &str, role: &str, content: &str) {
        if let Err(e) = self.session.append_turn(session_id, role, content).await {
            warn!(error = %e, role, "failed to append transcript turn");
        }
    }
}

// ---------------------------------------------------------------------------
// Observation rendering
// ---------------------------------------------------------------------------

/// Compact textual form of a decision for the transcript.
fn describe_decision(decision: &Decision) -> String {
    match decision {
        Decision::Search { query } => format!("search: {query}"),
        Decision::Visit { url } => format!("visit: {url}"),
        Decision::Record { concepts } => {
            let names: Vec<&str> = concepts.iter().map(|c| c.name.as_str()).collect();
            format!("record: {}", names.join(", "))
        }
        Decision::Finish => "finish".to_string(),
    }
}

fn search_observation(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("Search for \"{query}\" returned no results.");
    }
    let mut out = format!("Search results for \"{query}\":\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!("{}. {} — {}\n   {}\n", i + 1, hit.title, hit.url, hit.snippet));
    }
    out
}

fn page_observation(page: &PageText) -> String {
    let mut out = format!(
        "Page: {}\nTitle: {}\n\n{}\n",
        page.url,
        page.title.as_deref().unwrap_or("(untitled)"),
        truncate_content(&page.markdown, MAX_OBSERVATION_CHARS),
    );
    if !page.links.is_empty() {
        out.push_str("\nLinks on this page:\n");
        for link in page.links.iter().take(MAX_OBSERVATION_LINKS) {
            out.push_str(&format!("- {link}\n"));
        }
    }
    out
}

/// Truncate content to approximately `max_chars` characters.
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        content.to_string()
    } else {
        let mut end = max_chars;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}\n\n[... content truncated ...]", &content[..end])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
