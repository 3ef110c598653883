//! Reasoning-engine interface for the research loop.
//!
//! All non-determinism in the system sits behind one seam: [`Policy`].
//! The Builder calls `choose_next_action` at each loop iteration and
//! executes the returned [`Decision`] itself, so state updates, invariant
//! maintenance, and emission stay fully deterministic. [`InferencePolicy`]
//! backs the seam with Claude inference; [`ScriptedPolicy`] replays a fixed
//! decision queue for tests.

mod claude;
mod inference;

use std::collections::VecDeque;

use conceptscribe_shared::{Result, RunPhase};

pub use claude::{ChatClient, ChatMessage, ChatOutcome, ToolDef, ToolUse, Usage};
pub use inference::InferencePolicy;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// A concept as proposed by the policy, before merging into the model.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ConceptDraft {
    pub name: String,
    pub summary: String,
    pub detail: String,
    /// Page the concept was drawn from, when known.
    #[serde(default)]
    pub source_url: Option<String>,
}

/// The next action chosen by the reasoning engine.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Issue a web search with the given query.
    Search { query: String },
    /// Navigate to a page and read its content.
    Visit { url: String },
    /// Add or merge concepts into the conceptual model.
    Record { concepts: Vec<ConceptDraft> },
    /// Coverage is sufficient: proceed to emission.
    Finish,
}

impl Decision {
    /// Short label for logging and transcripts.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::Visit { .. } => "visit",
            Self::Record { .. } => "record",
            Self::Finish => "finish",
        }
    }
}

// ---------------------------------------------------------------------------
// Policy state view
// ---------------------------------------------------------------------------

/// Read-only view of the run handed to the policy at each iteration.
///
/// Deliberately narrow: the policy sees what it needs to choose an action,
/// not the Builder's internals.
#[derive(Debug, Clone)]
pub struct PolicyState<'a> {
    /// The topic keyword under research.
    pub keyword: &'a str,
    /// Current loop phase.
    pub phase: RunPhase,
    /// Outline of the specification reference, when it was retrievable.
    pub reference_outline: Option<&'a str>,
    /// Textual result of the previously executed action.
    pub observation: &'a str,
    /// Names recorded in the conceptual model so far, in insertion order.
    pub concept_names: &'a [String],
    /// Pages visited so far.
    pub pages_visited: usize,
    /// Page-visit bound for this run.
    pub max_pages: usize,
    /// Decisions consumed so far.
    pub steps_taken: usize,
    /// Decision bound for this run.
    pub max_steps: usize,
}

// ---------------------------------------------------------------------------
// Policy trait
// ---------------------------------------------------------------------------

/// Chooses the next action given the current run state.
pub trait Policy {
    fn choose_next_action(
        &mut self,
        state: &PolicyState<'_>,
    ) -> impl Future<Output = Result<Decision>>;
}

// ---------------------------------------------------------------------------
// Scripted policy (deterministic, for tests)
// ---------------------------------------------------------------------------

/// Replays a fixed queue of decisions; yields [`Decision::Finish`] once the
/// queue is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedPolicy {
    script: VecDeque<Decision>,
}

impl ScriptedPolicy {
    pub fn new(script: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl Policy for ScriptedPolicy {
    async fn choose_next_action(&mut self, _state: &PolicyState<'_>) -> Result<Decision> {
        Ok(self.script.pop_front().unwrap_or(Decision::Finish))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state<'a>(keyword: &'a str, observation: &'a str) -> PolicyState<'a> {
        PolicyState {
            keyword,
            phase: RunPhase::Discover,
            reference_outline: None,
            observation,
            concept_names: &[],
            pages_visited: 0,
            max_pages: 25,
            steps_taken: 0,
            max_steps: 60,
        }
    }

    #[tokio::test]
    async fn scripted_policy_replays_then_finishes() {
        let mut policy = ScriptedPolicy::new([
            Decision::Search {
                query: "REST documentation".into(),
            },
            Decision::Visit {
                url: "https://docs.test/rest".into(),
            },
        ]);

        let s = state("REST", "");
        assert!(matches!(
            policy.choose_next_action(&s).await.unwrap(),
            Decision::Search { .. }
        ));
        assert!(matches!(
            policy.choose_next_action(&s).await.unwrap(),
            Decision::Visit { .. }
        ));
        // Exhausted scripts finish rather than loop forever
        assert!(matches!(
            policy.choose_next_action(&s).await.unwrap(),
            Decision::Finish
        ));
    }

    #[test]
    fn decision_kinds() {
        assert_eq!(Decision::Finish.kind(), "finish");
        assert_eq!(
            Decision::Record { concepts: vec![] }.kind(),
            "record"
        );
    }
}
