//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider takes the conversation plus the tool declarations and streams
//! back what the model produced, normalized into [`ProviderEvent`]s so the
//! session loop never inspects vendor-specific payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolCall;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// System instructions sent ahead of the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// Why the provider stopped producing output for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the answer.
    Stop,
    /// The model wants tool results before continuing.
    ToolCalls,
    /// Output token limit reached.
    Length,
    /// Anything else the vendor reported, or no reason at all.
    Other,
}

/// One normalized item of a provider's streamed response.
///
/// A well-formed stream is any number of `TextDelta`/`ToolCall` items
/// followed by exactly one `End`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProviderEvent {
    /// Partial answer text.
    TextDelta { text: String },

    /// A fully assembled tool call request.
    ToolCall { call: ToolCall },

    /// The response is complete.
    End {
        finish_reason: FinishReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

/// Receiving half of a provider stream.
pub type ProviderStream = mpsc::Receiver<Result<ProviderEvent, ProviderError>>;

/// The core Provider trait.
///
/// The session loop calls `stream()` without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a stream of normalized events.
    ///
    /// Errors returned here happen before any output was produced; errors
    /// inside the stream interrupt a response that already started.
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req: ProviderRequest =
            serde_json::from_str(r#"{"model":"gpt-4o","messages":[]}"#).unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.system.is_none());
        assert!(req.tools.is_empty());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "weather".into(),
            description: "Get the weather in a location (fahrenheit)".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "location": { "type": "string" }
                },
                "required": ["location"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("weather"));
        assert!(json.contains("location"));
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total += Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        total += Usage {
            prompt_tokens: 20,
            completion_tokens: 2,
            total_tokens: 22,
        };
        assert_eq!(total.total_tokens, 37);
        assert_eq!(total.prompt_tokens, 30);
    }

    #[test]
    fn end_event_tagging() {
        let event = ProviderEvent::End {
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "end");
        assert_eq!(json["finish_reason"], "tool_calls");
    }
}
