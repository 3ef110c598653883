//! Anthropic Messages API client.
//!
//! Chat-style inference: an ordered transcript plus a declared tool set goes
//! in; either final text or a tool invocation request comes out. The host
//! executes requested tools and feeds results back as later turns.

use serde::{Deserialize, Serialize};
use tracing::debug;

use conceptscribe_shared::{Result, ScribeError};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API client.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// A declared tool the model may invoke.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One message in the conversation transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// API request body.
#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    system: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDef],
}

/// API response body.
#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

/// A single content block in the response.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

/// Token usage for one call.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: usize,
    #[serde(default)]
    pub output_tokens: usize,
}

/// A requested tool invocation.
#[derive(Debug, Clone)]
pub struct ToolUse {
    pub name: String,
    pub input: serde_json::Value,
}

/// Distilled outcome of one inference call: final text, a tool request,
/// or both (text preceding the tool call).
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub text: Option<String>,
    pub tool_use: Option<ToolUse>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl ChatClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (for integration tests).
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// One inference call: system + bounded transcript + declared tools.
    pub async fn complete(
        &self,
        model: &str,
        max_tokens: usize,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<ChatOutcome> {
        let request = MessageRequest {
            model,
            max_tokens,
            system,
            messages,
            tools,
        };

        debug!(
            model,
            messages = messages.len(),
            tools = tools.len(),
            "calling messages API"
        );

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ScribeError::Inference(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScribeError::Inference(format!(
                "API error {status}: {}",
                &body[..body.len().min(300)]
            )));
        }

        let parsed: MessageResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::Inference(format!("invalid response body: {e}")))?;

        let mut text = None;
        let mut tool_use = None;
        for block in parsed.content {
            match block {
                ContentBlock::Text { text: t } if text.is_none() => text = Some(t),
                ContentBlock::ToolUse { name, input, .. } if tool_use.is_none() => {
                    tool_use = Some(ToolUse { name, input });
                }
                _ => {}
            }
        }

        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            stop_reason = parsed.stop_reason.as_deref().unwrap_or("none"),
            "inference complete"
        );

        Ok(ChatOutcome {
            text,
            tool_use,
            stop_reason: parsed.stop_reason,
            usage: parsed.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_tools() {
        let messages = vec![ChatMessage::user("find REST docs")];
        let tools = vec![ToolDef {
            name: "web_search".into(),
            description: "Search the web".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"],
            }),
        }];
        let request = MessageRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: 1024,
            system: "You are a research agent.",
            messages: &messages,
            tools: &tools,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""model":"claude-sonnet-4-20250514""#));
        assert!(json.contains(r#""name":"web_search""#));
        assert!(json.contains(r#""required":["query"]"#));
    }

    #[test]
    fn request_omits_empty_tools() {
        let messages = vec![ChatMessage::user("hi")];
        let request = MessageRequest {
            model: "m",
            max_tokens: 16,
            system: "s",
            messages: &messages,
            tools: &[],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("tools"));
    }

    #[test]
    fn response_deserializes_tool_use() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Searching now."},
                {"type": "tool_use", "id": "tu_1", "name": "web_search",
                 "input": {"query": "REST official documentation"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 120, "output_tokens": 35}
        }"#;
        let parsed: MessageResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.content.len(), 2);
        assert_eq!(parsed.usage.input_tokens, 120);
        match &parsed.content[1] {
            ContentBlock::ToolUse { name, input, .. } => {
                assert_eq!(name, "web_search");
                assert_eq!(input["query"], "REST official documentation");
            }
            other => panic!("expected tool_use, got {other:?}"),
        }
    }

    #[test]
    fn response_tolerates_unknown_block_types() {
        let json = r#"{
            "content": [{"type": "thinking", "thinking": "..."}],
            "usage": {"input_tokens": 1, "output_tokens": 1}
        }"#;
        let parsed: MessageResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed.content[0], ContentBlock::Other));
    }

    #[tokio::test]
    async fn complete_against_mock_server() {
        let server = wiremock::MockServer::start().await;

        let body = serde_json::json!({
            "content": [
                {"type": "tool_use", "id": "tu_1", "name": "finish_research", "input": {}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 50, "output_tokens": 10}
        });

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = ChatClient::new("test-key").with_base_url(&server.uri());
        let outcome = client
            .complete("model", 256, "system", &[ChatMessage::user("go")], &[])
            .await
            .unwrap();

        assert!(outcome.text.is_none());
        assert_eq!(outcome.tool_use.unwrap().name, "finish_research");
        assert_eq!(outcome.usage.output_tokens, 10);
    }

    #[tokio::test]
    async fn api_error_maps_to_inference_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(429).set_body_string("rate limited"),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new("test-key").with_base_url(&server.uri());
        let err = client
            .complete("model", 256, "system", &[ChatMessage::user("go")], &[])
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("429"));
    }
}
