//! Inference-backed policy: maps Claude tool-use onto loop decisions.
//!
//! Each iteration sends the system prompt, a bounded window of prior
//! exchanges, and the latest observation; the model answers with one of the
//! declared tools, which becomes a [`Decision`]. Older turns fall out of the
//! window (they remain in the session store) — a deliberate memory/cost
//! tradeoff for long crawls.

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use conceptscribe_shared::{Result, ScribeError};

use crate::claude::{ChatClient, ChatMessage, ToolDef};
use crate::{ConceptDraft, Decision, PolicyState, Policy};

/// Policy backed by the Anthropic Messages API.
pub struct InferencePolicy {
    client: ChatClient,
    model: String,
    max_tokens: usize,
    /// Prior exchanges replayed per call (user+assistant pairs).
    history_window: usize,
    /// Full in-memory transcript; only a window of it is replayed.
    exchanges: Vec<ChatMessage>,
    /// Cumulative token usage across the run.
    tokens_in: usize,
    tokens_out: usize,
}

impl InferencePolicy {
    pub fn new(
        client: ChatClient,
        model: impl Into<String>,
        max_tokens: usize,
        history_window: usize,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
            history_window,
            exchanges: Vec::new(),
            tokens_in: 0,
            tokens_out: 0,
        }
    }

    /// Cumulative `(input, output)` token usage.
    pub fn token_usage(&self) -> (usize, usize) {
        (self.tokens_in, self.tokens_out)
    }

    /// The replayed message window: the last `history_window` exchanges
    /// (one exchange = user turn + assistant turn).
    fn window(&self) -> &[ChatMessage] {
        let keep = self.history_window * 2;
        let start = self.exchanges.len().saturating_sub(keep);
        &self.exchanges[start..]
    }

    fn system_prompt(state: &PolicyState<'_>) -> String {
        let mut prompt = format!(
            "You are a research agent expressing conceptual models in llms.txt form.\n\
             Research the topic \"{}\" by searching the web, crawling official \
             documentation, and recording the bounded concepts that make up the \
             topic's conceptual model.\n\n\
             Work in this order: search for official documentation, visit the most \
             authoritative entry points, follow relevant links, and record each \
             distinct concept with a one-line summary and a detailed description. \
             Re-recording a known concept extends it, so add to concepts as you \
             learn more. When the concept set covers the topic, finish.\n\n\
             Prefer official documentation over blogs or forums. Never re-visit a \
             page the observations mark as already visited.",
            state.keyword
        );

        if let Some(outline) = state.reference_outline {
            prompt.push_str(
                "\n\nThe output will follow the llms.txt convention; its \
                 specification has this structure:\n",
            );
            prompt.push_str(outline);
        }

        prompt
    }

    fn tool_defs() -> Vec<ToolDef> {
        vec![
            ToolDef {
                name: "web_search".into(),
                description: "Search the web for documentation about the topic.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search query" }
                    },
                    "required": ["query"],
                }),
            },
            ToolDef {
                name: "open_page".into(),
                description: "Navigate to a URL and read its rendered content.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Absolute http(s) URL" }
                    },
                    "required": ["url"],
                }),
            },
            ToolDef {
                name: "record_concept".into(),
                description: "Add a concept to the conceptual model, or extend it \
                              if the name is already recorded."
                    .into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "summary": { "type": "string", "description": "One line" },
                        "detail": { "type": "string", "description": "Full conceptual-model text" },
                        "source_url": { "type": "string", "description": "Page this was drawn from" }
                    },
                    "required": ["name", "summary", "detail"],
                }),
            },
            ToolDef {
                name: "finish_research".into(),
                description: "Signal that the concept set is complete; the index \
                              and concept files will be written."
                    .into(),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    fn state_message(state: &PolicyState<'_>) -> String {
        let concepts = if state.concept_names.is_empty() {
            "(none yet)".to_string()
        } else {
            state.concept_names.join(", ")
        };

        format!(
            "Phase: {}\nPages visited: {}/{}\nSteps used: {}/{}\n\
             Concepts recorded: {concepts}\n\nObservation:\n{}",
            state.phase.as_str(),
            state.pages_visited,
            state.max_pages,
            state.steps_taken,
            state.max_steps,
            if state.observation.is_empty() {
                "(start of run)"
            } else {
                state.observation
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Tool input shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SearchInput {
    query: String,
}

#[derive(Deserialize)]
struct OpenPageInput {
    url: String,
}

impl Policy for InferencePolicy {
    #[instrument(skip_all, fields(keyword = %state.keyword, step = state.steps_taken))]
    async fn choose_next_action(&mut self, state: &PolicyState<'_>) -> Result<Decision> {
        let system = Self::system_prompt(state);
        let user = Self::state_message(state);

        let mut messages: Vec<ChatMessage> = self.window().to_vec();
        messages.push(ChatMessage::user(user.clone()));

        let outcome = self
            .client
            .complete(
                &self.model,
                self.max_tokens,
                &system,
                &messages,
                &Self::tool_defs(),
            )
            .await?;

        self.tokens_in += outcome.usage.input_tokens;
        self.tokens_out += outcome.usage.output_tokens;

        let decision = match outcome.tool_use {
            Some(tool) => match tool.name.as_str() {
                "web_search" => {
                    let input: SearchInput = serde_json::from_value(tool.input)
                        .map_err(|e| ScribeError::Inference(format!("bad search input: {e}")))?;
                    Decision::Search { query: input.query }
                }
                "open_page" => {
                    let input: OpenPageInput = serde_json::from_value(tool.input)
                        .map_err(|e| ScribeError::Inference(format!("bad page input: {e}")))?;
                    Decision::Visit { url: input.url }
                }
                "record_concept" => {
                    let draft: ConceptDraft = serde_json::from_value(tool.input)
                        .map_err(|e| ScribeError::Inference(format!("bad concept input: {e}")))?;
                    Decision::Record {
                        concepts: vec![draft],
                    }
                }
                "finish_research" => Decision::Finish,
                other => {
                    return Err(ScribeError::Inference(format!(
                        "model requested undeclared tool: {other}"
                    )));
                }
            },
            None => {
                // A plain text answer means the model considers itself done.
                warn!("no tool call in response, treating as finish");
                Decision::Finish
            }
        };

        // Record the exchange for future windows.
        self.exchanges.push(ChatMessage::user(user));
        self.exchanges.push(ChatMessage::assistant(format!(
            "{}{}",
            outcome.text.as_deref().map(|t| format!("{t}\n")).unwrap_or_default(),
            decision_summary(&decision),
        )));

        debug!(decision = decision.kind(), "policy decided");
        Ok(decision)
    }
}

/// Compact textual form of a decision, replayed as assistant history.
fn decision_summary(decision: &Decision) -> String {
    match decision {
        Decision::Search { query } => format!("[web_search] {query}"),
        Decision::Visit { url } => format!("[open_page] {url}"),
        Decision::Record { concepts } => {
            let names: Vec<&str> = concepts.iter().map(|c| c.name.as_str()).collect();
            format!("[record_concept] {}", names.join(", "))
        }
        Decision::Finish => "[finish_research]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conceptscribe_shared::RunPhase;

    fn state<'a>(observation: &'a str, names: &'a [String]) -> PolicyState<'a> {
        PolicyState {
            keyword: "REST",
            phase: RunPhase::Crawl,
            reference_outline: Some("# llms.txt\n- Format\n"),
            observation,
            concept_names: names,
            pages_visited: 1,
            max_pages: 25,
            steps_taken: 2,
            max_steps: 60,
        }
    }

    fn mock_response(tool_name: &str, input: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "content": [
                {"type": "tool_use", "id": "tu_1", "name": tool_name, "input": input}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 100, "output_tokens": 20}
        })
    }

    async fn policy_for(server: &wiremock::MockServer) -> InferencePolicy {
        let client = ChatClient::new("test-key").with_base_url(&server.uri());
        InferencePolicy::new(client, "test-model", 1024, 3)
    }

    #[tokio::test]
    async fn maps_web_search_to_decision() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                mock_response("web_search", serde_json::json!({"query": "REST docs"})),
            ))
            .mount(&server)
            .await;

        let mut policy = policy_for(&server).await;
        let decision = policy
            .choose_next_action(&state("", &[]))
            .await
            .unwrap();

        match decision {
            Decision::Search { query } => assert_eq!(query, "REST docs"),
            other => panic!("expected search, got {other:?}"),
        }
        assert_eq!(policy.token_usage(), (100, 20));
    }

    #[tokio::test]
    async fn maps_record_concept_to_decision() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(mock_response(
                "record_concept",
                serde_json::json!({
                    "name": "Resource",
                    "summary": "An addressable entity",
                    "detail": "Resources are identified by URIs.",
                    "source_url": "https://docs.test/rest"
                }),
            )))
            .mount(&server)
            .await;

        let mut policy = policy_for(&server).await;
        let decision = policy
            .choose_next_action(&state("page content ...", &[]))
            .await
            .unwrap();

        match decision {
            Decision::Record { concepts } => {
                assert_eq!(concepts.len(), 1);
                assert_eq!(concepts[0].name, "Resource");
                assert_eq!(
                    concepts[0].source_url.as_deref(),
                    Some("https://docs.test/rest")
                );
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_only_response_finishes() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "The model is complete."}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 5}
            })))
            .mount(&server)
            .await;

        let mut policy = policy_for(&server).await;
        let decision = policy.choose_next_action(&state("", &[])).await.unwrap();
        assert!(matches!(decision, Decision::Finish));
    }

    #[tokio::test]
    async fn history_window_is_bounded() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                mock_response("web_search", serde_json::json!({"query": "q"})),
            ))
            .mount(&server)
            .await;

        let mut policy = policy_for(&server).await;
        let names: Vec<String> = vec![];
        for i in 0..10 {
            let obs = format!("observation {i}");
            let s = state(&obs, &names);
            policy.choose_next_action(&s).await.unwrap();
        }

        // window = history_window exchanges = 3 user + 3 assistant turns
        assert_eq!(policy.window().len(), 6);
        assert_eq!(policy.exchanges.len(), 20);
        // Oldest turns dropped, newest kept
        assert!(policy.window()[5].content.contains("[web_search]"));
    }
}
