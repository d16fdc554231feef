//! # Careers Core
//!
//! Domain types, traits, and error definitions for the Careers chat backend.
//! This crate has **no framework dependencies**: it defines the conversation
//! model, the provider seam and the tool registry that every other crate
//! builds on.
//!
//! ## Design Philosophy
//!
//! The two external collaborators of a chat run, the model provider and the
//! tool executors, are traits here. Implementations live in their own
//! crates, so the session loop can be exercised against scripted stubs.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorKind, ProviderError, Result, ToolError};
pub use message::{Conversation, Message, Part, Role};
pub use provider::{
    FinishReason, Provider, ProviderEvent, ProviderRequest, ProviderStream, ToolDefinition, Usage,
};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
