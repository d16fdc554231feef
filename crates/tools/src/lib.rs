//! Built-in tool implementations for Careers.
//!
//! The chat surface ships a single placeholder tool, `weather`. Register
//! additional tools on the registry returned by [`default_registry`] before
//! wrapping it in an `Arc`.

pub mod weather;

use careers_core::error::ToolError;
use careers_core::tool::ToolRegistry;

pub use weather::WeatherTool;

/// Create a tool registry with all built-in tools.
pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(WeatherTool))?;
    Ok(registry)
}
