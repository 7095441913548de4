//! The external LLM provider (spec §1: out of scope) is treated as an
//! opaque tool-calling agent behind a streaming interface, grounded in the
//! teacher pack's provider abstraction (`providers::LlmProvider` in the
//! wintermute example): a trait the chat orchestrator drives, agnostic to
//! which concrete model answers it.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of the agent's reply. `text_delta` is forwarded to the client
/// immediately; `tool_call` is executed locally (see `ToolRegistry`) and its
/// result fed back to the provider before the agent resumes.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    TextDelta(String),
    ToolCall { call_id: String, name: String, arguments: Value },
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub call_id: String,
    pub content: String,
}

/// A single turn with the agent: conversation history plus any tool results
/// produced since the agent last yielded, already-bound tool definitions.
pub struct AgentTurnRequest {
    pub history: Vec<AgentMessage>,
    pub tool_results: Vec<ToolResultMessage>,
    pub tools: Vec<ToolDefinition>,
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn stream_turn(&self, request: AgentTurnRequest) -> BoxStream<'static, AgentEvent>;
}

/// HTTP client against an OpenAI-chat-completions-shaped streaming endpoint.
/// `provider_url`/`api_key`/`model` are opaque knobs (spec §6) — this struct
/// never interprets them beyond "where to POST, how to authenticate".
#[derive(Clone)]
pub struct HttpAgentClient {
    client: reqwest::Client,
    provider_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpAgentClient {
    pub fn new(provider_url: String, api_key: Option<String>, model: String, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build agent HTTP client");
        Self { client, provider_url, api_key, model }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn stream_turn(&self, request: AgentTurnRequest) -> BoxStream<'static, AgentEvent> {
        use futures::StreamExt;

        let body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "messages": request.history,
            "tools": request.tools,
            "tool_results": request.tool_results,
        });

        let mut req = self.client.post(&self.provider_url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!("agent provider request failed: {e}");
                return futures::stream::once(async { AgentEvent::Done }).boxed();
            }
        };

        let byte_stream = response.bytes_stream();
        let events = byte_stream.flat_map(|chunk| {
            let events = match chunk {
                Ok(bytes) => parse_sse_chunk(&bytes),
                Err(e) => {
                    tracing::error!("agent stream read error: {e}");
                    vec![AgentEvent::Done]
                }
            };
            futures::stream::iter(events)
        });

        events.boxed()
    }
}

/// Parses one or more `data: <json>` lines out of a raw SSE chunk. Providers
/// in this shape emit either `{"delta": "..."}`, `{"tool_call": {...}}`, or
/// the literal `[DONE]` sentinel.
fn parse_sse_chunk(bytes: &[u8]) -> Vec<AgentEvent> {
    let text = String::from_utf8_lossy(bytes);
    let mut events = Vec::new();

    for line in text.lines() {
        let Some(payload) = line.strip_prefix("data: ") else {
            continue;
        };
        if payload == "[DONE]" {
            events.push(AgentEvent::Done);
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(payload) else {
            continue;
        };
        if let Some(delta) = value.get("delta").and_then(Value::as_str) {
            events.push(AgentEvent::TextDelta(delta.to_string()));
        } else if let Some(tool_call) = value.get("tool_call") {
            let call_id = tool_call.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            let name = tool_call.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let arguments = tool_call.get("arguments").cloned().unwrap_or(Value::Null);
            events.push(AgentEvent::ToolCall { call_id, name, arguments });
        }
    }

    events
}
