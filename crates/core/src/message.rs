//! Message and Conversation domain types.
//!
//! These are the value objects that flow through a chat run:
//! the client posts a Conversation → the session loop sends it to the
//! provider → the provider answers with text and tool calls → tool results
//! are appended → the extended Conversation is handed back to the caller.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution results
    Tool,
}

/// One typed fragment of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    /// Plain text.
    Text { text: String },

    /// The model asked for a tool to run.
    ToolCall {
        call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },

    /// The output of a previously requested tool call.
    ToolResult {
        call_id: String,
        tool_name: String,
        output: serde_json::Value,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The call id this part refers to, if it is a tool part.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::ToolCall { call_id, .. } | Self::ToolResult { call_id, .. } => Some(call_id),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message ID (clients may omit it)
    #[serde(default = "new_message_id")]
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// Ordered content fragments
    #[serde(default)]
    pub parts: Vec<Part>,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: new_message_id(),
            role,
            parts,
        }
    }

    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Create an assistant message with a single text part.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Part::text(text)])
    }

    /// Create a tool message carrying tool-result parts.
    pub fn tool(results: Vec<Part>) -> Self {
        Self::new(Role::Tool, results)
    }

    /// Concatenation of every text part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool-call parts of this message, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &Part> {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::ToolCall { .. }))
    }
}

/// An ordered sequence of messages, owned by the caller.
///
/// The backend keeps no conversation state between requests: each run
/// receives the full history and returns it extended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Ordered messages
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent assistant message, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Check the structural invariants of the history.
    ///
    /// - the conversation is not empty
    /// - tool-call parts only appear in assistant messages, tool-result
    ///   parts only in tool messages
    /// - tool-call ids are unique
    /// - every tool-result answers exactly one earlier tool-call
    pub fn validate(&self) -> Result<(), Error> {
        if self.messages.is_empty() {
            return Err(Error::InvalidConversation(
                "conversation has no messages".into(),
            ));
        }

        let mut called: HashSet<&str> = HashSet::new();
        let mut answered: HashSet<&str> = HashSet::new();

        for (index, message) in self.messages.iter().enumerate() {
            for part in &message.parts {
                match part {
                    Part::Text { .. } => {}
                    Part::ToolCall { call_id, .. } => {
                        if message.role != Role::Assistant {
                            return Err(Error::InvalidConversation(format!(
                                "message {index}: tool-call '{call_id}' outside an assistant message"
                            )));
                        }
                        if !called.insert(call_id.as_str()) {
                            return Err(Error::InvalidConversation(format!(
                                "message {index}: duplicate tool-call id '{call_id}'"
                            )));
                        }
                    }
                    Part::ToolResult { call_id, .. } => {
                        if message.role != Role::Tool {
                            return Err(Error::InvalidConversation(format!(
                                "message {index}: tool-result '{call_id}' outside a tool message"
                            )));
                        }
                        if !called.contains(call_id.as_str()) {
                            return Err(Error::InvalidConversation(format!(
                                "message {index}: tool-result '{call_id}' has no matching tool-call"
                            )));
                        }
                        if !answered.insert(call_id.as_str()) {
                            return Err(Error::InvalidConversation(format!(
                                "message {index}: tool-call '{call_id}' answered twice"
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
