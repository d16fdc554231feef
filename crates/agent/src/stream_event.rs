//! Session-level streaming events.
//!
//! `SessionEvent` is what a run emits while it works. The gateway forwards
//! each one as an SSE frame named by [`SessionEvent::event_type`].

use careers_core::error::ErrorKind;
use careers_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted by a session run, in emission order.
///
/// A run emits any number of `text-delta`, `tool-call` and `tool-result`
/// events, then exactly one terminal event (`finish` or `error`). A
/// `tool-result` always follows the `tool-call` with the same `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// Partial answer text from the model.
    TextDelta { delta: String },

    /// The model requested a tool.
    ToolCall {
        call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },

    /// A requested tool finished.
    ToolResult {
        call_id: String,
        tool_name: String,
        output: serde_json::Value,
    },

    /// The run failed. Everything streamed before this stays valid.
    Error {
        kind: ErrorKind,
        message: String,
        retryable: bool,
    },

    /// The run completed. `truncated` is set when the step ceiling ended it.
    Finish {
        steps: u32,
        truncated: bool,
        usage: Usage,
    },
}

impl SessionEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::ToolCall { .. } => "tool-call",
            Self::ToolResult { .. } => "tool-result",
            Self::Error { .. } => "error",
            Self::Finish { .. } => "finish",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Finish { .. })
    }

    pub(crate) fn from_error(err: &careers_core::Error) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
