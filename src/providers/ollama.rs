use std::collections::HashSet;

use serde_json::{json, Value};

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::OllamaConfig;
use super::utils::{sse_data, tools_to_openai_spec};
use crate::errors::{ChatError, Result};
use crate::models::{Message, Part, Role, Thread};

pub const OLLAMA_HOST: &str = "http://localhost:11434";

pub struct OllamaAdapter {
    config: OllamaConfig,
}

impl OllamaAdapter {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }
}

impl Adapter for OllamaAdapter {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::from([Capability::Tools, Capability::Streaming])
    }

    /// Native `/api/chat` dialect: system and tool roles pass through,
    /// sampling parameters nest under `options`, and the model streams
    /// unless told otherwise.
    fn to_request(&self, thread: &Thread) -> Result<Value> {
        let mut messages = Vec::new();
        for message in thread.messages() {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let mut entry = json!({ "role": role, "content": message.text() });
            let tool_calls: Vec<Value> = message
                .content
                .parts()
                .iter()
                .filter_map(|part| match part {
                    Part::ToolCall { name, arguments } => Some(json!({
                        "function": { "name": name, "arguments": arguments }
                    })),
                    _ => None,
                })
                .collect();
            if !tool_calls.is_empty() {
                entry["tool_calls"] = json!(tool_calls);
            }
            messages.push(entry);
        }

        let config = &thread.config;
        let mut options = serde_json::Map::new();
        if let Some(temperature) = config.temperature {
            options.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_k) = config.top_k {
            options.insert("top_k".into(), json!(top_k));
        }
        if let Some(top_p) = config.top_p {
            options.insert("top_p".into(), json!(top_p));
        }
        if let Some(max_tokens) = config.max_tokens {
            options.insert("num_predict".into(), json!(max_tokens));
        }
        if !config.stop_sequences.is_empty() {
            options.insert("stop".into(), json!(config.stop_sequences));
        }

        let mut payload = json!({
            "model": self.config.model_key,
            "messages": messages,
            "stream": false,
        });
        let body = payload.as_object_mut().expect("payload is an object");
        if !options.is_empty() {
            body.insert("options".into(), Value::Object(options));
        }
        if !thread.tools.is_empty() {
            body.insert("tools".into(), json!(tools_to_openai_spec(&thread.tools)?));
        }

        Ok(payload)
    }

    fn from_response(&self, response: &Value) -> Result<Vec<Message>> {
        if let Some(error) = response.get("error").and_then(|e| e.as_str()) {
            return Err(ChatError::Decode(format!("vendor error: {}", error)));
        }
        let inner = response
            .get("message")
            .ok_or_else(|| ChatError::Decode("response has no message".into()))?;

        let mut message = Message::assistant();
        if let Some(text) = inner.get("content").and_then(|c| c.as_str()) {
            if !text.is_empty() {
                message = message.with_text(text);
            }
        }
        if let Some(tool_calls) = inner.get("tool_calls").and_then(|t| t.as_array()) {
            for call in tool_calls {
                let name = call["function"]["name"]
                    .as_str()
                    .ok_or_else(|| ChatError::Decode("tool call has no name".into()))?;
                let arguments = call["function"]["arguments"].clone();
                message = message.with_tool_call(name, arguments);
            }
        }
        Ok(vec![message])
    }

    /// Frames are newline-delimited JSON objects, one per chunk, with a
    /// `done` flag on the last.
    fn to_stream_chunk(&self, frame: &str) -> Result<Option<ChatDelta>> {
        let data = match sse_data(frame) {
            Some(data) => data,
            None => return Ok(None),
        };

        let value: Value = serde_json::from_str(data)
            .map_err(|e| ChatError::Decode(format!("malformed stream frame: {}", e)))?;

        match value["message"].get("content").and_then(|c| c.as_str()) {
            Some(text) if !text.is_empty() => Ok(Some(ChatDelta::text(0, text))),
            _ => Ok(None),
        }
    }

    fn endpoint(&self, _stream: bool) -> String {
        let host = self.config.host.as_deref().unwrap_or(OLLAMA_HOST);
        format!("{}/api/chat", host.trim_end_matches('/'))
    }

    // Local daemon, no credentials.
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
