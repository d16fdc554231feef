//! Weather tool: placeholder data for the career chat demo.
//!
//! There is no weather backend behind this tool. It answers with a random
//! Fahrenheit temperature so conversations can exercise a full tool
//! round-trip without network access.

use async_trait::async_trait;
use careers_core::error::ToolError;
use careers_core::tool::Tool;
use rand::Rng;
use serde::Serialize;

/// Lowest temperature the placeholder reports, in Fahrenheit.
pub const MIN_TEMPERATURE_F: i64 = 32;
/// Highest temperature the placeholder reports, in Fahrenheit.
pub const MAX_TEMPERATURE_F: i64 = 90;

pub struct WeatherTool;

#[derive(Debug, Serialize)]
struct WeatherReport<'a> {
    location: &'a str,
    temperature: i64,
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get the weather in a location (fahrenheit)"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The location to get the weather for"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let location = input["location"]
            .as_str()
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: self.name().to_string(),
                reason: "missing 'location'".into(),
            })?;

        let temperature = rand::rng().random_range(MIN_TEMPERATURE_F..=MAX_TEMPERATURE_F);
        tracing::debug!(location, temperature, "Weather placeholder answered");

        serde_json::to_value(WeatherReport {
            location,
            temperature,
        })
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_location_and_temperature() {
        let output = WeatherTool
            .execute(serde_json::json!({"location": "Boston"}))
            .await
            .unwrap();

        assert_eq!(output["location"], "Boston");
        let temperature = output["temperature"].as_i64().unwrap();
        assert!((MIN_TEMPERATURE_F..=MAX_TEMPERATURE_F).contains(&temperature));
        assert_eq!(output.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn temperature_stays_in_range() {
        for _ in 0..200 {
            let output = WeatherTool
                .execute(serde_json::json!({"location": "Denver"}))
                .await
                .unwrap();
            let t = output["temperature"].as_i64().unwrap();
            assert!((32..=90).contains(&t), "out of range: {t}");
        }
    }

    #[tokio::test]
    async fn missing_location_is_an_execution_error() {
        let err = WeatherTool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
