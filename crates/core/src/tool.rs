//! Tool trait: the functions the model may call mid-generation.
//!
//! Tools are registered once at startup. The registry compiles each input
//! schema when the tool is registered and is read-only afterwards, so it can
//! be shared between concurrent chat runs behind an `Arc`.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Input as a JSON value
    pub input: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that produced it
    pub name: String,

    /// Structured output
    pub output: serde_json::Value,
}

/// The core Tool trait.
///
/// Each tool supplies its declaration (name, description, input schema) and
/// its executor. Inputs reaching `execute` have already been validated
/// against `parameters_schema`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with validated input.
    async fn execute(&self, input: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    validator: jsonschema::Validator,
    tool: Box<dyn Tool>,
}

/// A registry of available tools.
///
/// The session loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up, validate and execute tools when the LLM requests them
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// Fails if the name is taken (the existing tool stays) or if the input
    /// schema does not compile.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }

        let definition = tool.to_definition();
        let validator =
            jsonschema::validator_for(&definition.parameters).map_err(|e| {
                ToolError::InvalidSchema {
                    tool_name: name.clone(),
                    reason: e.to_string(),
                }
            })?;

        debug!(tool = %name, "Registered tool");
        self.tools.insert(
            name,
            RegisteredTool {
                definition,
                validator,
                tool,
            },
        );
        Ok(())
    }

    /// Get a tool's declaration by name.
    pub fn get(&self, name: &str) -> Result<&ToolDefinition, ToolError> {
        self.entry(name).map(|t| &t.definition)
    }

    /// Check raw input against the tool's declared schema.
    pub fn validate_input(&self, name: &str, input: &serde_json::Value) -> Result<(), ToolError> {
        let entry = self.entry(name)?;
        if entry.validator.is_valid(input) {
            return Ok(());
        }

        let reason = entry
            .validator
            .iter_errors(input)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(ToolError::SchemaValidation {
            tool_name: name.to_string(),
            reason,
        })
    }

    /// Get all tool definitions (for sending to the LLM), ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// Look up, validate and execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        self.validate_input(&call.name, &call.input)?;
        let entry = self.entry(&call.name)?;

        // A panicking executor fails this call instead of the whole run.
        let output = AssertUnwindSafe(entry.tool.execute(call.input.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                warn!(tool = %call.name, %reason, "Tool panicked");
                Err(ToolError::ExecutionFailed {
                    tool_name: call.name.clone(),
                    reason: format!("tool panicked: {reason}"),
                })
            })
            .map_err(|e| match e {
                ToolError::ExecutionFailed { .. } => e,
                other => ToolError::ExecutionFailed {
                    tool_name: call.name.clone(),
                    reason: other.to_string(),
                },
            })?;

        Ok(ToolResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            output,
        })
    }

    /// List all registered tool names, ordered.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn entry(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
