use std::collections::HashSet;

use serde_json::{json, Value};

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::CohereConfig;
use super::utils::sse_data;
use crate::errors::{ChatError, Result};
use crate::models::{Message, Role, Thread};

pub const COHERE_HOST: &str = "https://api.cohere.ai";

pub struct CohereAdapter {
    config: CohereConfig,
}

impl CohereAdapter {
    pub fn new(config: CohereConfig) -> Self {
        Self { config }
    }
}

fn history_role(role: Role) -> &'static str {
    match role {
        Role::System => "SYSTEM",
        Role::User | Role::Tool => "USER",
        Role::Assistant => "CHATBOT",
    }
}

impl Adapter for CohereAdapter {
    fn name(&self) -> &'static str {
        "cohere"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::from([Capability::Streaming])
    }

    /// This vendor splits the conversation: the latest user message is the
    /// `message` field, everything before it is `chat_history`, and system
    /// guidance becomes the `preamble`.
    fn to_request(&self, thread: &Thread) -> Result<Value> {
        let messages = thread.messages();

        let last_user = messages
            .iter()
            .rposition(|m| matches!(m.role, Role::User | Role::Tool))
            .ok_or_else(|| {
                ChatError::Validation("conversation has no user message to send".into())
            })?;

        let mut preamble: Option<String> = None;
        let mut history = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            if index == last_user {
                continue;
            }
            if message.role == Role::System {
                let text = message.text();
                preamble = Some(match preamble {
                    Some(existing) => format!("{}\n\n{}", existing, text),
                    None => text,
                });
            } else {
                history.push(json!({
                    "role": history_role(message.role),
                    "message": message.text(),
                }));
            }
        }

        let mut payload = json!({
            "model": self.config.model_key,
            "message": messages[last_user].text(),
        });
        let body = payload.as_object_mut().expect("payload is an object");

        if !history.is_empty() {
            body.insert("chat_history".into(), json!(history));
        }
        if let Some(preamble) = preamble {
            body.insert("preamble".into(), json!(preamble));
        }

        let config = &thread.config;
        if let Some(temperature) = config.temperature {
            body.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_k) = config.top_k {
            body.insert("k".into(), json!(top_k));
        }
        if let Some(top_p) = config.top_p {
            body.insert("p".into(), json!(top_p));
        }
        if let Some(max_tokens) = config.max_tokens {
            body.insert("max_tokens".into(), json!(max_tokens));
        }
        if !config.stop_sequences.is_empty() {
            body.insert("stop_sequences".into(), json!(config.stop_sequences));
        }

        Ok(payload)
    }

    fn from_response(&self, response: &Value) -> Result<Vec<Message>> {
        if let Some(message) = response.get("message").and_then(|m| m.as_str()) {
            // Error bodies carry a bare message and no text field.
            if response.get("text").is_none() {
                return Err(ChatError::Decode(format!(
                    "vendor returned no text: {}",
                    message
                )));
            }
        }
        let text = response
            .get("text")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ChatError::Decode("response has no text field".into()))?;
        Ok(vec![Message::assistant().with_text(text)])
    }

    fn to_stream_chunk(&self, frame: &str) -> Result<Option<ChatDelta>> {
        let data = match sse_data(frame) {
            Some(data) => data,
            None => return Ok(None),
        };

        let value: Value = serde_json::from_str(data)
            .map_err(|e| ChatError::Decode(format!("malformed stream frame: {}", e)))?;

        match value.get("event_type").and_then(|t| t.as_str()) {
            Some("text-generation") => match value.get("text").and_then(|t| t.as_str()) {
                Some(text) if !text.is_empty() => Ok(Some(ChatDelta::text(0, text))),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn endpoint(&self, _stream: bool) -> String {
        let host = self.config.host.as_deref().unwrap_or(COHERE_HOST);
        format!("{}/v1/chat", host.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.config.api_key),
        )]
    }
}
