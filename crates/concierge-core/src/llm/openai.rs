//! OpenAI-compatible streaming chat client.
//!
//! Works against any provider exposing `POST {base_url}/chat/completions`
//! with `stream: true` server-sent events, including Gemini's OpenAI
//! compatibility endpoint (the default).

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace, warn};

use super::{ChatModel, ChatTurn, CompletionRequest, EventStream, LlmError, ModelEvent};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`OpenAiCompatModel`].
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
        }
    }
}

pub struct OpenAiCompatModel {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl std::fmt::Debug for OpenAiCompatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatModel")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatModel {
    /// Build a client. Fails with [`LlmError::MissingApiKey`] when no
    /// (non-blank) key is configured.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model,
        })
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "stream": true,
            "messages": request.turns.iter().map(turn_to_wire).collect::<Vec<_>>(),
        });

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }

        body
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: CompletionRequest) -> Result<EventStream, LlmError> {
        let body = self.request_body(&request);
        debug!(model = %self.model, turns = request.turns.len(), "opening model stream");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let events = response
            .bytes_stream()
            .eventsource()
            .map(|item| match item {
                Ok(event) => decode_event(&event.data),
                Err(e) => vec![Err(LlmError::Stream(e.to_string()))],
            })
            .flat_map(futures::stream::iter)
            .boxed();

        Ok(events)
    }
}

fn turn_to_wire(turn: &ChatTurn) -> Value {
    match turn {
        ChatTurn::System(content) => json!({ "role": "system", "content": content }),
        ChatTurn::User(content) => json!({ "role": "user", "content": content }),
        ChatTurn::Assistant { content, tool_calls } => {
            let mut msg = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                msg["tool_calls"] = Value::Array(
                    tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": { "name": call.name, "arguments": call.arguments }
                            })
                        })
                        .collect(),
                );
            }
            msg
        }
        ChatTurn::ToolResult { call_id, content } => {
            json!({ "role": "tool", "tool_call_id": call_id, "content": content })
        }
    }
}

// ── SSE chunk decoding ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallChunk {
    index: Option<usize>,
    id: Option<String>,
    function: Option<FunctionChunk>,
}

#[derive(Debug, Deserialize)]
struct FunctionChunk {
    name: Option<String>,
    arguments: Option<String>,
}

fn extract_api_error(event: &Value) -> Option<String> {
    let error = event.get("error")?;
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return Some(message.to_owned());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_owned());
    }
    Some("an error occurred during streaming".to_owned())
}

/// Translate one SSE `data:` payload into model events.
fn decode_event(raw: &str) -> Vec<Result<ModelEvent, LlmError>> {
    trace!(data = raw, "model SSE");
    if raw.trim() == "[DONE]" {
        return Vec::new();
    }

    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return vec![Err(LlmError::Stream(format!("{e}: {raw}")))],
    };

    if let Some(message) = extract_api_error(&value) {
        return vec![Err(LlmError::Provider(message))];
    }

    let chunk: Chunk = match serde_json::from_value(value) {
        Ok(c) => c,
        Err(e) => return vec![Err(LlmError::Stream(format!("{e}: {raw}")))],
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        // Usage-only / keepalive chunk.
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
        events.push(Ok(ModelEvent::Text(text)));
    }
    for (position, call) in choice.delta.tool_calls.into_iter().flatten().enumerate() {
        let (name, arguments) = match call.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        events.push(Ok(ModelEvent::ToolCallDelta {
            index: call.index.unwrap_or(position),
            id: call.id,
            name,
            arguments,
        }));
    }
    if let Some(reason) = choice.finish_reason {
        events.push(Ok(ModelEvent::Finished { reason: Some(reason) }));
    }
    if events.is_empty() {
        warn!(data = raw, "model chunk carried no content");
    }
    events
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::llm::{ToolCall, ToolDefinition};

    fn model() -> OpenAiCompatModel {
        OpenAiCompatModel::new(OpenAiCompatConfig {
            api_key: Some("test-key".into()),
            base_url: "http://localhost:9/v1/".into(),
            model: "test-model".into(),
        })
        .unwrap()
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = OpenAiCompatModel::new(OpenAiCompatConfig::default()).unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));

        let blank = OpenAiCompatConfig { api_key: Some("  ".into()), ..Default::default() };
        assert!(matches!(OpenAiCompatModel::new(blank), Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(model().endpoint, "http://localhost:9/v1/chat/completions");
    }

    #[test]
    fn request_body_carries_tools_and_tool_turns() {
        let request = CompletionRequest {
            turns: vec![
                ChatTurn::System("sys".into()),
                ChatTurn::User("hi".into()),
                ChatTurn::Assistant {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: "call_1".into(),
                        name: "notify_team".into(),
                        arguments: r#"{"question":"q"}"#.into(),
                    }],
                },
                ChatTurn::ToolResult { call_id: "call_1".into(), content: "{}".into() },
            ],
            tools: vec![ToolDefinition {
                name: "notify_team".into(),
                description: "d".into(),
                parameters: json!({ "type": "object" }),
            }],
        };

        let body = model().request_body(&request);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["content"], Value::Null);
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "notify_team");
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["type"], "function");
    }

    #[test]
    fn request_body_omits_empty_tool_list() {
        let body = model().request_body(&CompletionRequest {
            turns: vec![ChatTurn::User("hi".into())],
            tools: vec![],
        });
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn decodes_text_and_finish() {
        let events = decode_event(
            r#"{"object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":"stop"}]}"#,
        );
        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                ModelEvent::Text("Hel".into()),
                ModelEvent::Finished { reason: Some("stop".into()) }
            ]
        );
    }

    #[test]
    fn decodes_tool_call_fragments() {
        let events = decode_event(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"notify_team","arguments":"{\"q"}}]}}]}"#,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &ModelEvent::ToolCallDelta {
                index: 0,
                id: Some("c1".into()),
                name: Some("notify_team".into()),
                arguments: Some("{\"q".into()),
            }
        );
    }

    #[test]
    fn done_marker_and_usage_chunks_are_silent() {
        assert!(decode_event("[DONE]").is_empty());
        assert!(decode_event(r#"{"choices":[],"usage":{"total_tokens":3}}"#).is_empty());
    }

    #[test]
    fn provider_error_in_stream() {
        let events = decode_event(r#"{"error":{"message":"quota exceeded"}}"#);
        assert!(matches!(&events[0], Err(LlmError::Provider(m)) if m == "quota exceeded"));
    }

    #[test]
    fn garbage_payload_is_a_stream_error() {
        let events = decode_event("not json");
        assert!(matches!(&events[0], Err(LlmError::Stream(_))));
    }
}
