//! OpenAI-compatible chat-completions adapter.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::{Value, json};

use crate::errors::CompletionError;
use crate::provider::{ProviderAdapter, ProviderFactory};
use crate::sse::{SseDecoder, SseFrame};
use crate::stream::{StreamEvent, StreamEventStream};
use crate::types::{FinishReason, Message, Request, Role, ToolDefinition, Usage};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    name: String,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: "openai".to_string(),
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: Request) -> Result<StreamEventStream, CompletionError> {
        let body = wire_request(&request);
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| CompletionError::transient(None, error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::classify_status(status.as_u16(), &body));
        }

        let state = StreamState {
            bytes: response.bytes_stream().boxed(),
            decoder: SseDecoder::new(),
            queue: VecDeque::new(),
            cursor: ChunkCursor::default(),
            done: false,
        };
        let events = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.queue.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let text = String::from_utf8_lossy(&chunk).into_owned();
                        for frame in state.decoder.feed(&text) {
                            absorb_frame(&mut state, frame);
                        }
                    }
                    Some(Err(error)) => {
                        state.done = true;
                        state
                            .queue
                            .push_back(Err(CompletionError::transient(None, error.to_string())));
                    }
                    None => {
                        state.done = true;
                        let decoder = std::mem::take(&mut state.decoder);
                        if let Some(frame) = decoder.finish() {
                            absorb_frame(&mut state, frame);
                        }
                        if !state.cursor.finish_emitted {
                            push_finish(&mut state);
                        }
                    }
                }
            }
        });
        Ok(Box::pin(events))
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    queue: VecDeque<Result<StreamEvent, CompletionError>>,
    cursor: ChunkCursor,
    done: bool,
}

/// Finish-reason and usage arrive on different chunks; the cursor holds
/// them until the stream terminator so exactly one finish event is emitted.
#[derive(Debug, Default)]
struct ChunkCursor {
    finish: Option<FinishReason>,
    usage: Option<Usage>,
    finish_emitted: bool,
}

fn absorb_frame(state: &mut StreamState, frame: SseFrame) {
    if frame.data.is_empty() {
        return;
    }
    if frame.is_done() {
        push_finish(state);
        state.done = true;
        return;
    }
    match serde_json::from_str::<Value>(&frame.data) {
        Ok(chunk) => {
            for event in events_from_chunk(&chunk, &mut state.cursor) {
                state.queue.push_back(Ok(event));
            }
        }
        Err(error) => {
            state.done = true;
            state.queue.push_back(Err(CompletionError::Decode(format!(
                "bad stream chunk: {error}"
            ))));
        }
    }
}

fn push_finish(state: &mut StreamState) {
    if state.cursor.finish_emitted {
        return;
    }
    state.cursor.finish_emitted = true;
    state.queue.push_back(Ok(StreamEvent::Finish {
        reason: state
            .cursor
            .finish
            .take()
            .unwrap_or(FinishReason::Other("unknown".to_string())),
        usage: state.cursor.usage.take(),
    }));
}

fn events_from_chunk(chunk: &Value, cursor: &mut ChunkCursor) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if let Some(usage) = chunk.get("usage").filter(|value| !value.is_null()) {
        cursor.usage = Some(Usage {
            prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
        });
    }

    let Some(choices) = chunk.get("choices").and_then(Value::as_array) else {
        return events;
    };
    for choice in choices {
        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            cursor.finish = Some(FinishReason::from_wire(reason));
        }
        let Some(delta) = choice.get("delta") else {
            continue;
        };
        if let Some(content) = delta.get("content").and_then(Value::as_str) {
            if !content.is_empty() {
                events.push(StreamEvent::TextDelta {
                    delta: content.to_string(),
                });
            }
        }
        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let function = call.get("function");
                events.push(StreamEvent::ToolCallDelta {
                    index: call.get("index").and_then(Value::as_u64).unwrap_or(0) as u32,
                    id: call
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    name: function
                        .and_then(|f| f.get("name"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    arguments: function
                        .and_then(|f| f.get("arguments"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }
    }
    events
}

fn wire_request(request: &Request) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();
    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "stream": true,
        "stream_options": { "include_usage": true },
    });
    if let Some(tools) = &request.tools {
        body["tools"] = Value::Array(tools.iter().map(wire_tool).collect());
    }
    if let Some(choice) = &request.tool_choice {
        body["tool_choice"] = json!(choice.mode);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    body
}

fn wire_message(message: &Message) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut wire = json!({ "role": role });
    if let Some(content) = &message.content {
        wire["content"] = json!(content);
    }
    if let Some(call_id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(call_id);
    }
    if !message.tool_calls.is_empty() {
        wire["tool_calls"] = Value::Array(
            message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments },
                    })
                })
                .collect(),
        );
    }
    wire
}

fn wire_tool(definition: &ToolDefinition) -> Value {
    let mut function = json!({
        "name": definition.name,
        "description": definition.description,
    });
    if let Some(parameters) = &definition.parameters {
        function["parameters"] = parameters.clone();
    }
    json!({ "type": "function", "function": function })
}

pub struct OpenAiFactory;

impl ProviderFactory for OpenAiFactory {
    fn provider_id(&self) -> &'static str {
        "openai"
    }

    fn from_env(&self) -> Option<Arc<dyn ProviderAdapter>> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Some(Arc::new(OpenAiAdapter::new(base_url, api_key)))
    }
}
