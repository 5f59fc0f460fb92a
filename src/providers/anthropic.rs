use std::collections::HashSet;

use serde_json::{json, Value};

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::AnthropicConfig;
use super::utils::sse_data;
use crate::errors::{ChatError, Result, VendorErrorKind};
use crate::models::{Message, Part, Role, Thread};

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    config: AnthropicConfig,
}

impl AnthropicAdapter {
    pub fn new(config: AnthropicConfig) -> Self {
        Self { config }
    }

    /// This vendor takes system guidance as a single top-level field, so
    /// multiple system messages are joined into one. Tool-role messages
    /// fold into user turns.
    fn convert_messages(messages: &[&Message]) -> (Option<String>, Vec<Value>) {
        let mut system: Option<String> = None;
        let mut converted = Vec::new();

        for message in messages {
            match message.role {
                Role::System => {
                    let text = message.text();
                    system = Some(match system {
                        Some(existing) => format!("{}\n\n{}", existing, text),
                        None => text,
                    });
                }
                Role::User | Role::Tool => {
                    converted.push(json!({
                        "role": "user",
                        "content": Self::content_blocks(message),
                    }));
                }
                Role::Assistant => {
                    converted.push(json!({
                        "role": "assistant",
                        "content": Self::content_blocks(message),
                    }));
                }
            }
        }

        (system, converted)
    }

    fn content_blocks(message: &Message) -> Vec<Value> {
        message
            .content
            .parts()
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(json!({ "type": "text", "text": text })),
                Part::ToolCall { name, arguments } => Some(json!({
                    "type": "tool_use",
                    "id": format!("toolu_{}", name),
                    "name": name,
                    "input": arguments,
                })),
                Part::ToolResult { call_id, content } => Some(json!({
                    "type": "tool_result",
                    "tool_use_id": call_id,
                    "content": content,
                })),
                Part::Image { .. } => None,
            })
            .collect()
    }
}

impl Adapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::from([Capability::Tools, Capability::Streaming])
    }

    fn to_request(&self, thread: &Thread) -> Result<Value> {
        let (system, messages) = Self::convert_messages(&thread.messages());
        let config = &thread.config;

        let mut payload = json!({
            "model": self.config.model_key,
            "messages": messages,
            "max_tokens": config
                .max_tokens
                .or(self.config.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
        });
        let body = payload.as_object_mut().expect("payload is an object");

        if let Some(system) = system {
            body.insert("system".into(), json!(system));
        }
        if let Some(temperature) = config.temperature {
            body.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = config.top_p {
            body.insert("top_p".into(), json!(top_p));
        }
        if let Some(top_k) = config.top_k {
            body.insert("top_k".into(), json!(top_k));
        }
        if !config.stop_sequences.is_empty() {
            body.insert("stop_sequences".into(), json!(config.stop_sequences));
        }

        if !thread.tools.is_empty() {
            let tools: Vec<Value> = thread
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect();
            body.insert("tools".into(), json!(tools));
        }

        Ok(payload)
    }

    fn from_response(&self, response: &Value) -> Result<Vec<Message>> {
        if response.get("type").and_then(|t| t.as_str()) == Some("error") {
            let message = response["error"]["message"]
                .as_str()
                .unwrap_or("unknown vendor error")
                .to_string();
            let kind = match response["error"]["type"].as_str() {
                Some("authentication_error") => VendorErrorKind::Auth,
                Some("rate_limit_error") => VendorErrorKind::RateLimit,
                Some("invalid_request_error") => VendorErrorKind::InvalidRequest,
                Some("overloaded_error") | Some("api_error") => VendorErrorKind::Server,
                _ => VendorErrorKind::Other,
            };
            return Err(ChatError::Vendor { kind, message });
        }

        let blocks = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ChatError::Decode("response has no content array".into()))?;

        let mut message = Message::assistant();
        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        message = message.with_text(text);
                    }
                }
                Some("tool_use") => {
                    let name = block
                        .get("name")
                        .and_then(|n| n.as_str())
                        .ok_or_else(|| ChatError::Decode("tool_use block has no name".into()))?;
                    let input = block.get("input").cloned().unwrap_or(json!({}));
                    message = message.with_tool_call(name, input);
                }
                _ => {}
            }
        }
        Ok(vec![message])
    }

    fn to_stream_chunk(&self, frame: &str) -> Result<Option<ChatDelta>> {
        let data = match sse_data(frame) {
            Some(data) => data,
            None => return Ok(None),
        };

        let value: Value = serde_json::from_str(data)
            .map_err(|e| ChatError::Decode(format!("malformed stream frame: {}", e)))?;

        match value.get("type").and_then(|t| t.as_str()) {
            Some("content_block_delta") => {
                match value["delta"].get("text").and_then(|t| t.as_str()) {
                    Some(text) if !text.is_empty() => Ok(Some(ChatDelta::text(0, text))),
                    _ => Ok(None),
                }
            }
            Some("error") => Err(ChatError::Vendor {
                kind: VendorErrorKind::Other,
                message: value["error"]["message"]
                    .as_str()
                    .unwrap_or("stream error")
                    .to_string(),
            }),
            _ => Ok(None),
        }
    }

    fn endpoint(&self, _stream: bool) -> String {
        let host = self.config.host.as_deref().unwrap_or(ANTHROPIC_HOST);
        format!("{}/v1/messages", host.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), self.config.api_key.clone()),
            (
                "anthropic-version".to_string(),
                ANTHROPIC_VERSION.to_string(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Content, GenerationConfig};

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(AnthropicConfig {
            model_key: "claude-3-5-sonnet-latest".into(),
            api_key: "test_key".into(),
            host: None,
            max_tokens: None,
        })
    }

    #[test]
    fn system_messages_join_into_top_level_field() -> Result<()> {
        let mut thread = Thread::new();
        thread.push_message(Message::new(Role::System, Content::Text("a".into())));
        thread.push_message(Message::new(Role::System, Content::Text("b".into())));
        thread.push_message(Message::user().with_text("hi"));

        let request = adapter().to_request(&thread)?;
        assert_eq!(request["system"], "a\n\nb");
        assert_eq!(request["messages"].as_array().unwrap().len(), 1);
        assert_eq!(request["messages"][0]["role"], "user");
        Ok(())
    }

    #[test]
    fn max_tokens_always_present_with_vendor_default() -> Result<()> {
        let mut thread = Thread::new();
        thread.push_message(Message::user().with_text("hi"));
        let request = adapter().to_request(&thread)?;
        assert_eq!(request["max_tokens"], 4096);

        let mut configured = Thread::new().with_config(GenerationConfig {
            max_tokens: Some(100),
            ..Default::default()
        });
        configured.push_message(Message::user().with_text("hi"));
        let request = adapter().to_request(&configured)?;
        assert_eq!(request["max_tokens"], 100);
        Ok(())
    }

    #[test]
    fn tools_map_to_input_schema() -> Result<()> {
        let mut thread = Thread::new().with_tool(crate::models::ToolDeclaration::new(
            "lookup",
            "Semantic search",
            json!({ "type": "object" }),
        ));
        thread.push_message(Message::user().with_text("hi"));

        let request = adapter().to_request(&thread)?;
        assert_eq!(request["tools"][0]["name"], "lookup");
        assert_eq!(request["tools"][0]["input_schema"], json!({ "type": "object" }));
        Ok(())
    }

    #[test]
    fn response_decodes_text_and_tool_use_blocks() -> Result<()> {
        let response = json!({
            "type": "message",
            "content": [
                { "type": "text", "text": "Checking." },
                { "type": "tool_use", "id": "toolu_1", "name": "lookup", "input": { "q": "x" } }
            ]
        });
        let messages = adapter().from_response(&response)?;
        let parts = messages[0].content.parts();
        assert_eq!(parts[0], Part::text("Checking."));
        assert_eq!(parts[1], Part::tool_call("lookup", json!({ "q": "x" })));
        Ok(())
    }

    #[test]
    fn vendor_error_body_is_classified() {
        let response = json!({
            "type": "error",
            "error": { "type": "rate_limit_error", "message": "slow down" }
        });
        let result = adapter().from_response(&response);
        assert!(matches!(
            result,
            Err(ChatError::Vendor {
                kind: VendorErrorKind::RateLimit,
                ..
            })
        ));
    }

    #[test]
    fn stream_frames_decode_content_block_deltas_only() -> Result<()> {
        let adapter = adapter();
        assert_eq!(
            adapter.to_stream_chunk(
                r#"data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}"#
            )?,
            Some(ChatDelta::text(0, "Hi"))
        );
        assert_eq!(
            adapter.to_stream_chunk(r#"data: {"type":"message_start"}"#)?,
            None
        );
        assert_eq!(adapter.to_stream_chunk("event: content_block_delta")?, None);
        Ok(())
    }
}
