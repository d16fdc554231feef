//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks AI,
//! and any endpoint exposing a streaming `/v1/chat/completions`.
//!
//! The SSE body is decoded in a spawned task. Content deltas are forwarded
//! as they arrive; tool-call fragments are accumulated per index and
//! emitted, in index order, once the choice reports a finish reason.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use careers_core::error::ProviderError;
use careers_core::message::{Message, Part, Role};
use careers_core::provider::*;
use careers_core::tool::ToolCall;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM provider.
///
/// This handles the vast majority of LLM providers since most expose
/// an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert a conversation to OpenAI API messages.
    ///
    /// Each tool-result part becomes its own `tool` message, which is how
    /// the chat completions API pairs results with `tool_call_id`s.
    fn to_api_messages(system: Option<&str>, messages: &[Message]) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);

        if let Some(system) = system {
            out.push(ApiMessage::text("system", system));
        }

        for m in messages {
            match m.role {
                Role::User => out.push(ApiMessage::text("user", m.text())),
                Role::Assistant => {
                    let tool_calls: Vec<ApiToolCall> = m
                        .parts
                        .iter()
                        .filter_map(|p| match p {
                            Part::ToolCall {
                                call_id,
                                tool_name,
                                input,
                            } => Some(ApiToolCall {
                                id: call_id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tool_name.clone(),
                                    arguments: encode_arguments(input),
                                },
                            }),
                            _ => None,
                        })
                        .collect();

                    let text = m.text();
                    out.push(ApiMessage {
                        role: "assistant".into(),
                        content: if text.is_empty() && !tool_calls.is_empty() {
                            None
                        } else {
                            Some(text)
                        },
                        tool_calls: if tool_calls.is_empty() {
                            None
                        } else {
                            Some(tool_calls)
                        },
                        tool_call_id: None,
                    });
                }
                Role::Tool => {
                    for part in &m.parts {
                        if let Part::ToolResult {
                            call_id, output, ..
                        } = part
                        {
                            out.push(ApiMessage {
                                role: "tool".into(),
                                content: Some(output.to_string()),
                                tool_calls: None,
                                tool_call_id: Some(call_id.clone()),
                            });
                        }
                    }
                }
            }
        }

        out
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request.system.as_deref(), &request.messages),
            "temperature": request.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }
}

/// Tool arguments travel as a JSON string. Arguments that never parsed are
/// kept as the raw string and sent back untouched.
fn encode_arguments(input: &serde_json::Value) -> String {
    match input {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn decode_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn status_error(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[async_trait]
impl careers_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, ProviderError> {
        if self.api_key.is_empty() && self.name != "ollama" {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{}'",
                self.name
            )));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(status_error(status, retry_after, error_body));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut state = StreamState::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                for data in drain_data_lines(&mut buffer) {
                    let events = match state.feed(&data) {
                        Ok(events) => events,
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    };
                    for event in events {
                        if tx.send(Ok(event)).await.is_err() {
                            trace!(provider = %provider_name, "Receiver dropped, stopping stream");
                            return;
                        }
                    }
                    if state.is_ended() {
                        return;
                    }
                }
            }

            match state.finish() {
                Ok(events) => {
                    for event in events {
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        Ok(rx)
    }
}

/// Pull every complete `data:` payload out of `buffer`, leaving any partial
/// trailing line in place.
///
/// Works on raw bytes: a network chunk may end inside a multi-byte
/// character, so only whole lines are decoded.
fn drain_data_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=line_end).collect();
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line,
            Err(e) => {
                trace!(error = %e, "Skipping SSE line that is not valid UTF-8");
                continue;
            }
        };
        let line = line.trim_end_matches(['\r', '\n']);

        // Skip empty lines and SSE comments
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        if let Some(data) = line.strip_prefix("data:") {
            out.push(data.trim().to_string());
        }
    }
    out
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        _ => FinishReason::Other,
    }
}

/// Decoding state for one streamed completion.
#[derive(Default)]
struct StreamState {
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    ended: bool,
}

impl StreamState {
    fn is_ended(&self) -> bool {
        self.ended
    }

    /// Feed one `data:` payload and return the events it completes.
    fn feed(&mut self, data: &str) -> Result<Vec<ProviderEvent>, ProviderError> {
        if self.ended {
            return Ok(Vec::new());
        }

        if data == "[DONE]" {
            return Ok(self.end());
        }

        let chunk = match serde_json::from_str::<StreamResponse>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                return Ok(Vec::new());
            }
        };

        if let Some(err) = chunk.error {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: err.message,
            });
        }

        let mut events = Vec::new();

        if let Some(choice) = chunk.choices.into_iter().next() {
            let delta = choice.delta;

            if let Some(content) = delta.content
                && !content.is_empty()
            {
                events.push(ProviderEvent::TextDelta { text: content });
            }

            for tc_delta in delta.tool_calls.unwrap_or_default() {
                let acc = self.tool_calls.entry(tc_delta.index).or_default();
                if let Some(id) = tc_delta.id {
                    acc.id = id;
                }
                if let Some(func) = tc_delta.function {
                    if let Some(name) = func.name {
                        acc.name = name;
                    }
                    if let Some(args) = func.arguments {
                        acc.arguments.push_str(&args);
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(map_finish_reason(&reason));
                events.extend(self.drain_tool_calls());
            }
        }

        // Usage arrives in a trailing chunk with no choices (stream_options)
        if let Some(usage) = chunk.usage {
            self.usage = Some(Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
            if self.finish_reason.is_some() {
                events.extend(self.end());
            }
        }

        Ok(events)
    }

    /// The byte stream closed. A response that never reported a finish
    /// reason was cut off.
    fn finish(&mut self) -> Result<Vec<ProviderEvent>, ProviderError> {
        if self.ended {
            return Ok(Vec::new());
        }
        if self.finish_reason.is_none() {
            return Err(ProviderError::StreamInterrupted(
                "stream closed before the response finished".into(),
            ));
        }
        Ok(self.end())
    }

    fn drain_tool_calls(&mut self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(|acc| ProviderEvent::ToolCall {
                call: acc.into_tool_call(),
            })
            .collect()
    }

    fn end(&mut self) -> Vec<ProviderEvent> {
        let mut events = self.drain_tool_calls();
        let finish_reason = match self.finish_reason {
            Some(reason) => reason,
            None if !events.is_empty() => FinishReason::ToolCalls,
            None => FinishReason::Other,
        };
        events.push(ProviderEvent::End {
            finish_reason,
            usage: self.usage,
        });
        self.ended = true;
        events
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta. Arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> ToolCall {
        let id = if self.id.is_empty() {
            format!("call_{}", uuid::Uuid::new_v4().simple())
        } else {
            self.id
        };
        ToolCall {
            id,
            name: self.name,
            input: decode_arguments(&self.arguments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careers_core::Provider;

    fn feed_all(state: &mut StreamState, chunks: &[&str]) -> Vec<ProviderEvent> {
        chunks
            .iter()
            .flat_map(|c| state.feed(c).unwrap())
            .collect()
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url().contains("api.openai.com"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url().contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://localhost:8000/v1/", "k");
        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn message_conversion_prepends_system() {
        let messages = vec![Message::user("Hello")];
        let api_messages =
            OpenAiCompatProvider::to_api_messages(Some("You are a counselor"), &messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
        assert_eq!(api_messages[1].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn message_conversion_with_tool_exchange() {
        let assistant = Message::new(
            Role::Assistant,
            vec![
                Part::ToolCall {
                    call_id: "call_1".into(),
                    tool_name: "weather".into(),
                    input: serde_json::json!({"location": "Paris"}),
                },
                Part::ToolCall {
                    call_id: "call_2".into(),
                    tool_name: "weather".into(),
                    input: serde_json::json!({"location": "Lyon"}),
                },
            ],
        );
        let tool = Message::tool(vec![
            Part::ToolResult {
                call_id: "call_1".into(),
                tool_name: "weather".into(),
                output: serde_json::json!({"location": "Paris", "temperature": 60}),
            },
            Part::ToolResult {
                call_id: "call_2".into(),
                tool_name: "weather".into(),
                output: serde_json::json!({"location": "Lyon", "temperature": 58}),
            },
        ]);

        let api_msgs = OpenAiCompatProvider::to_api_messages(None, &[assistant, tool]);
        assert_eq!(api_msgs.len(), 3);

        assert!(api_msgs[0].content.is_none());
        let tcs = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tcs.len(), 2);
        assert_eq!(tcs[0].function.arguments, r#"{"location":"Paris"}"#);

        assert_eq!(api_msgs[1].role, "tool");
        assert_eq!(api_msgs[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(api_msgs[2].tool_call_id.as_deref(), Some("call_2"));
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "weather".into(),
            description: "Get the weather in a location (fahrenheit)".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "weather");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn request_body_includes_tools_and_stream_flags() {
        let request = ProviderRequest {
            model: "gpt-4o".into(),
            system: None,
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            max_tokens: Some(256),
            tools: vec![ToolDefinition {
                name: "weather".into(),
                description: "d".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
        };
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["tools"][0]["function"]["name"], "weather");
    }

    #[test]
    fn data_lines_survive_split_chunks() {
        let mut buffer = b"data: {\"a\":1}\n\n: keep-alive\ndata: [DO".to_vec();
        assert_eq!(drain_data_lines(&mut buffer), vec![r#"{"a":1}"#]);
        assert_eq!(buffer, b"data: [DO");

        buffer.extend_from_slice(b"NE]\r\n");
        assert_eq!(drain_data_lines(&mut buffer), vec!["[DONE]"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn multibyte_text_split_across_chunks_is_intact() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"},\"finish_reason\":null}]}\n\n";
        let bytes = line.as_bytes();
        // Split between the two bytes of "é" (0xC3 0xA9).
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buffer = bytes[..split].to_vec();
        assert!(drain_data_lines(&mut buffer).is_empty());

        buffer.extend_from_slice(&bytes[split..]);
        let lines = drain_data_lines(&mut buffer);
        assert_eq!(lines.len(), 1);

        let mut state = StreamState::default();
        let events = state.feed(&lines[0]).unwrap();
        assert_eq!(
            events,
            vec![ProviderEvent::TextDelta {
                text: "caf\u{e9}".into()
            }]
        );
    }

    #[test]
    fn text_stream_yields_deltas_then_end() {
        let mut state = StreamState::default();
        let events = feed_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"content":" there"},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
                r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            ],
        );

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            ProviderEvent::TextDelta {
                text: "Hello".into()
            }
        );
        match &events[2] {
            ProviderEvent::End {
                finish_reason,
                usage,
            } => {
                assert_eq!(*finish_reason, FinishReason::Stop);
                assert_eq!(usage.unwrap().total_tokens, 15);
            }
            other => panic!("expected End, got {other:?}"),
        }
        assert!(state.is_ended());
        assert!(state.feed("[DONE]").unwrap().is_empty());
    }

    #[test]
    fn tool_call_fragments_are_assembled_in_index_order() {
        let mut state = StreamState::default();
        let events = feed_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"weather","arguments":""}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"weather","arguments":"{\"loca"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"tion\":\"Paris\"}"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"function":{"arguments":"{\"location\":\"Lyon\"}"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        );

        assert_eq!(events.len(), 3);
        match (&events[0], &events[1]) {
            (ProviderEvent::ToolCall { call: a }, ProviderEvent::ToolCall { call: b }) => {
                assert_eq!(a.id, "call_a");
                assert_eq!(a.input["location"], "Paris");
                assert_eq!(b.id, "call_b");
                assert_eq!(b.input["location"], "Lyon");
            }
            other => panic!("expected two tool calls, got {other:?}"),
        }
        assert!(matches!(
            events[2],
            ProviderEvent::End {
                finish_reason: FinishReason::ToolCalls,
                usage: None
            }
        ));
    }

    #[test]
    fn malformed_arguments_are_kept_raw() {
        let mut state = StreamState::default();
        let events = feed_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_x","function":{"name":"weather","arguments":"{oops"}}]},"finish_reason":"tool_calls"}]}"#,
            ],
        );
        match &events[0] {
            ProviderEvent::ToolCall { call } => {
                assert_eq!(call.input, serde_json::Value::String("{oops".into()));
                assert_eq!(encode_arguments(&call.input), "{oops");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        assert_eq!(decode_arguments(""), serde_json::json!({}));
    }

    #[test]
    fn truncated_stream_is_an_interruption() {
        let mut state = StreamState::default();
        feed_all(
            &mut state,
            &[r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#],
        );
        assert!(matches!(
            state.finish(),
            Err(ProviderError::StreamInterrupted(_))
        ));
    }

    #[test]
    fn stream_without_done_still_ends_after_finish_reason() {
        let mut state = StreamState::default();
        feed_all(
            &mut state,
            &[r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":"stop"}]}"#],
        );
        let events = state.finish().unwrap();
        assert!(matches!(
            events.as_slice(),
            [ProviderEvent::End {
                finish_reason: FinishReason::Stop,
                ..
            }]
        ));
    }

    #[test]
    fn in_stream_error_object_fails_the_stream() {
        let mut state = StreamState::default();
        let err = state
            .feed(r#"{"error":{"message":"context length exceeded"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("context length exceeded"));
    }

    #[test]
    fn unparseable_chunks_are_ignored() {
        let mut state = StreamState::default();
        assert!(state.feed("not json").unwrap().is_empty());
        assert!(!state.is_ended());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(429, Some(12), String::new()),
            ProviderError::RateLimited {
                retry_after_secs: 12
            }
        ));
        assert!(matches!(
            status_error(401, None, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        let err = status_error(503, None, "overloaded".into());
        assert!(err.is_retryable());
        assert!(!status_error(400, None, "bad".into()).is_retryable());
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let provider = OpenAiCompatProvider::new("openai", "http://127.0.0.1:9", "");
        let request = ProviderRequest {
            model: "gpt-4o".into(),
            system: None,
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
        };
        let err = provider.stream(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
