//! Error types for the Careers domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is what a chat run
//! reports to its caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for a chat run.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Inbound history ---
    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    // --- Run lifecycle ---
    #[error("Run exceeded its time budget of {budget_secs}s")]
    TimedOut { budget_secs: u64 },

    #[error("Run cancelled")]
    Cancelled,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Wire-level classification of an [`Error`], sent to clients in error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicateTool,
    InvalidSchema,
    UnknownTool,
    SchemaValidation,
    ToolExecution,
    Provider,
    InvalidConversation,
    TimedOut,
    Cancelled,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider(_) => ErrorKind::Provider,
            Self::Tool(e) => e.kind(),
            Self::InvalidConversation(_) => ErrorKind::InvalidConversation,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the caller may reasonably resend the same conversation.
    ///
    /// The core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::TimedOut { .. } => true,
            _ => false,
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Transport-level failures are worth retrying; configuration and
    /// credential failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::StreamInterrupted(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Invalid input schema for {tool_name}: {reason}")]
    InvalidSchema { tool_name: String, reason: String },

    #[error("Input for {tool_name} does not match its schema: {reason}")]
    SchemaValidation { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateTool(_) => ErrorKind::DuplicateTool,
            Self::InvalidSchema { .. } => ErrorKind::InvalidSchema,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            Self::ExecutionFailed { .. } => ErrorKind::ToolExecution,
        }
    }
}
