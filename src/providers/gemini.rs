use std::collections::HashSet;

use serde_json::{json, Value};

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::GeminiConfig;
use super::utils::sse_data;
use crate::errors::{ChatError, Result};
use crate::models::{Message, Part, Role, Thread};

pub const GEMINI_HOST: &str = "https://generativelanguage.googleapis.com";

const CONTEXT_FENCE_OPEN: &str = "---BEGIN IMPORTANT CONTEXT---";
const CONTEXT_FENCE_CLOSE: &str = "---END IMPORTANT CONTEXT---";

/// The four fixed categories, always at the most permissive threshold.
fn safety_settings() -> Value {
    json!([
        { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" }
    ])
}

pub struct GeminiAdapter {
    config: GeminiConfig,
}

impl GeminiAdapter {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }

    /// Map canonical messages to `contents` plus the optional
    /// `systemInstruction`.
    ///
    /// The vendor protocol has one dedicated system channel and no system
    /// turns: the first system message becomes `systemInstruction`, every
    /// later one is fenced and prepended to the next user message. When a
    /// fenced block has no following user message it becomes its own user
    /// turn, so no instruction is ever dropped.
    fn build_contents(messages: &[&Message]) -> (Vec<Value>, Option<Value>) {
        let mut system_instruction: Option<Value> = None;
        let mut pending_context: Vec<String> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for message in messages {
            match message.role {
                Role::System => {
                    let text = message.text();
                    if system_instruction.is_none() {
                        system_instruction = Some(json!({ "parts": [{ "text": text }] }));
                    } else {
                        pending_context.push(format!(
                            "{}\n{}\n{}",
                            CONTEXT_FENCE_OPEN, text, CONTEXT_FENCE_CLOSE
                        ));
                    }
                }
                Role::User | Role::Tool => {
                    let mut parts = gemini_parts(message);
                    if !pending_context.is_empty() {
                        let fence = pending_context.join("\n\n");
                        pending_context.clear();
                        let lead = match parts.first().and_then(|p| p["text"].as_str()) {
                            Some(text) => format!("{}\n\n{}", fence, text),
                            None => fence,
                        };
                        if parts.is_empty() {
                            parts.push(json!({ "text": lead }));
                        } else {
                            parts[0] = json!({ "text": lead });
                        }
                    }
                    contents.push(json!({ "role": "user", "parts": parts }));
                }
                Role::Assistant => {
                    contents.push(json!({ "role": "model", "parts": gemini_parts(message) }));
                }
            }
        }

        // Trailing fences with no user message to carry them.
        if !pending_context.is_empty() {
            contents.push(json!({
                "role": "user",
                "parts": [{ "text": pending_context.join("\n\n") }]
            }));
        }

        (contents, system_instruction)
    }

    fn generation_config(thread: &Thread) -> Value {
        let config = &thread.config;
        let mut generation = serde_json::Map::new();
        // Temperature passes through; the rest get vendor defaults.
        if let Some(temperature) = config.temperature {
            generation.insert("temperature".into(), json!(temperature));
        }
        generation.insert("topK".into(), json!(config.top_k.unwrap_or(1)));
        generation.insert("topP".into(), json!(config.top_p.unwrap_or(1.0)));
        generation.insert(
            "maxOutputTokens".into(),
            json!(config.max_tokens.unwrap_or(2048)),
        );
        generation.insert("stopSequences".into(), json!(config.stop_sequences));
        generation.insert("candidate_count".into(), json!(config.n.unwrap_or(1)));
        Value::Object(generation)
    }

    fn decode_candidate(candidate: &Value) -> Result<Message> {
        let content = candidate
            .get("content")
            .ok_or_else(|| ChatError::Decode("candidate has no content".into()))?;

        let role = match content.get("role").and_then(|r| r.as_str()) {
            Some("model") | None => Role::Assistant,
            Some("user") => Role::User,
            Some(other) => {
                return Err(ChatError::Decode(format!(
                    "unexpected candidate role '{}'",
                    other
                )))
            }
        };

        let parts = content
            .get("parts")
            .and_then(|p| p.as_array())
            .ok_or_else(|| ChatError::Decode("candidate content has no parts".into()))?;

        let mut message = Message::new(role, crate::models::Content::Parts(Vec::new()));
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                message = message.with_text(text);
            } else if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| ChatError::Decode("functionCall has no name".into()))?;
                let args = call.get("args").cloned().unwrap_or(json!({}));
                message = message.with_tool_call(name, args);
            }
        }
        Ok(message)
    }
}

/// A message's parts in vendor shape: every text part becomes `{ text }`.
fn gemini_parts(message: &Message) -> Vec<Value> {
    message
        .content
        .parts()
        .iter()
        .filter_map(|part| match part {
            Part::Text { text } => Some(json!({ "text": text })),
            Part::ToolResult { content, .. } => Some(json!({ "text": content })),
            _ => None,
        })
        .collect()
}

impl Adapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::from([
            Capability::Tools,
            Capability::Streaming,
            Capability::MultipleChoices,
        ])
    }

    fn to_request(&self, thread: &Thread) -> Result<Value> {
        let (mut contents, system_instruction) = Self::build_contents(&thread.messages());

        // Tool forcing: the vendor's ANY mode alone does not reliably make
        // the model name the one available tool, so the last user message
        // also gets an explicit directive line.
        if let Some(tool) = thread.tools.first() {
            if let Some(entry) = contents
                .iter_mut()
                .rev()
                .find(|c| c["role"] == "user")
            {
                if let Some(parts) = entry["parts"].as_array_mut() {
                    if let Some(last) = parts.last_mut() {
                        let text = last["text"].as_str().unwrap_or_default();
                        *last = json!({
                            "text": format!("{}\nUse the \"{}\" tool!", text, tool.name)
                        });
                    }
                }
            }
        }

        let mut payload = json!({
            "contents": contents,
            "generationConfig": Self::generation_config(thread),
        });
        let body = payload.as_object_mut().expect("payload is an object");

        if self.config.permissive_safety {
            body.insert("safetySettings".into(), safety_settings());
        }
        if let Some(instruction) = system_instruction {
            body.insert("systemInstruction".into(), instruction);
        }
        if !thread.tools.is_empty() {
            let declarations: Vec<Value> = thread
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect();
            body.insert(
                "tools".into(),
                json!([{ "function_declarations": declarations }]),
            );
            body.insert(
                "tool_config".into(),
                json!({ "function_calling_config": { "mode": "ANY" } }),
            );
        }

        Ok(payload)
    }

    fn from_response(&self, response: &Value) -> Result<Vec<Message>> {
        let candidates = response
            .get("candidates")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ChatError::Decode("response has no candidates".into()))?;
        if candidates.is_empty() {
            return Err(ChatError::Decode("response carried no candidates".into()));
        }
        candidates.iter().map(Self::decode_candidate).collect()
    }

    fn to_stream_chunk(&self, frame: &str) -> Result<Option<ChatDelta>> {
        let data = match sse_data(frame) {
            Some(data) => data,
            None => return Ok(None),
        };

        let value: Value = serde_json::from_str(data)
            .map_err(|e| ChatError::Decode(format!("malformed stream frame: {}", e)))?;

        let candidate = match value
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        {
            Some(candidate) => candidate,
            None => return Ok(None),
        };
        let choice_index = candidate.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize;

        match candidate["content"]["parts"][0].get("text").and_then(|t| t.as_str()) {
            Some(text) if !text.is_empty() => Ok(Some(ChatDelta::text(choice_index, text))),
            _ => Ok(None),
        }
    }

    // Streaming switches endpoints instead of flagging the body.
    fn streaming_payload(&self, payload: Value) -> Value {
        payload
    }

    fn endpoint(&self, stream: bool) -> String {
        let host = self.config.host.as_deref().unwrap_or(GEMINI_HOST);
        let host = host.trim_end_matches('/');
        if stream {
            format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
                host, self.config.model_key, self.config.api_key
            )
        } else {
            format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                host, self.config.model_key, self.config.api_key
            )
        }
    }

    // Credentials travel in the URL for this vendor.
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Content, GenerationConfig, ToolDeclaration};

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::new(GeminiConfig {
            model_key: "gemini-1.5-pro".into(),
            api_key: "test_key".into(),
            host: None,
            permissive_safety: true,
        })
    }

    fn expected_safety() -> Value {
        json!([
            { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE" },
            { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" },
            { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE" },
            { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" }
        ])
    }

    fn flat(role: Role, text: &str) -> Message {
        Message::new(role, Content::Text(text.into()))
    }

    #[test]
    fn system_messages_split_between_instruction_and_merge() -> Result<()> {
        let mut thread = Thread::new().with_config(GenerationConfig {
            temperature: Some(0.5),
            top_k: Some(10),
            top_p: Some(0.8),
            max_tokens: Some(100),
            stop_sequences: vec!["stop".into()],
            n: Some(2),
        });
        thread.push_message(flat(Role::System, "Write like a leprechaun"));
        thread.push_message(flat(
            Role::System,
            "---BEGIN NOTE---\nSystem message\n---END NOTE---",
        ));
        thread.push_message(flat(Role::User, "User message"));

        let request = adapter().to_request(&thread)?;

        let expected = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": "---BEGIN IMPORTANT CONTEXT---\n---BEGIN NOTE---\nSystem message\n---END NOTE---\n---END IMPORTANT CONTEXT---\n\nUser message" }]
                }
            ],
            "generationConfig": {
                "temperature": 0.5,
                "topK": 10,
                "topP": 0.8,
                "maxOutputTokens": 100,
                "stopSequences": ["stop"],
                "candidate_count": 2,
            },
            "safetySettings": expected_safety(),
            "systemInstruction": { "parts": [{ "text": "Write like a leprechaun" }] }
        });
        assert_eq!(request, expected);
        Ok(())
    }

    #[test]
    fn no_system_messages_means_no_instruction_and_full_defaults() -> Result<()> {
        let mut thread = Thread::new().with_config(GenerationConfig {
            temperature: Some(0.5),
            ..Default::default()
        });
        thread.push_message(flat(Role::User, "User message"));

        let request = adapter().to_request(&thread)?;

        let expected = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "User message" }] }
            ],
            "generationConfig": {
                "temperature": 0.5,
                "topK": 1,
                "topP": 1.0,
                "maxOutputTokens": 2048,
                "stopSequences": [],
                "candidate_count": 1,
            },
            "safetySettings": expected_safety(),
        });
        assert_eq!(request, expected);
        assert!(request.get("systemInstruction").is_none());
        Ok(())
    }

    #[test]
    fn tools_force_function_calling_and_nudge_last_user_message() -> Result<()> {
        let mut thread = Thread::new()
            .with_config(GenerationConfig {
                temperature: Some(0.5),
                max_tokens: Some(100),
                ..Default::default()
            })
            .with_tool(ToolDeclaration::new(
                "lookup",
                "Semantic search",
                json!({
                    "type": "object",
                    "properties": {
                        "hypotheticals": { "type": "array", "items": { "type": "string" } }
                    }
                }),
            ));
        thread.push_message(flat(Role::User, "Hello"));

        let request = adapter().to_request(&thread)?;

        assert_eq!(
            request["contents"][0]["parts"][0]["text"],
            "Hello\nUse the \"lookup\" tool!"
        );
        assert_eq!(
            request["tools"],
            json!([{
                "function_declarations": [{
                    "name": "lookup",
                    "description": "Semantic search",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "hypotheticals": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                }]
            }])
        );
        assert_eq!(
            request["tool_config"],
            json!({ "function_calling_config": { "mode": "ANY" } })
        );
        Ok(())
    }

    #[test]
    fn part_sequences_map_in_order_with_role_translation() -> Result<()> {
        let mut thread = Thread::new().with_config(GenerationConfig {
            temperature: Some(0.5),
            ..Default::default()
        });
        thread.push_message(Message::user().with_text("User message"));
        thread.push_message(Message::assistant().with_text("Assistant message"));
        thread.push_message(Message::user().with_text("User message 2"));

        let request = adapter().to_request(&thread)?;

        assert_eq!(
            request["contents"],
            json!([
                { "role": "user", "parts": [{ "text": "User message" }] },
                { "role": "model", "parts": [{ "text": "Assistant message" }] },
                { "role": "user", "parts": [{ "text": "User message 2" }] }
            ])
        );
        Ok(())
    }

    #[test]
    fn third_and_later_system_messages_each_get_a_fence() -> Result<()> {
        let mut thread = Thread::new();
        thread.push_message(flat(Role::System, "be brief"));
        thread.push_message(flat(Role::System, "note one"));
        thread.push_message(flat(Role::System, "note two"));
        thread.push_message(flat(Role::User, "hi"));

        let request = adapter().to_request(&thread)?;
        let text = request["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert_eq!(
            text,
            "---BEGIN IMPORTANT CONTEXT---\nnote one\n---END IMPORTANT CONTEXT---\n\n\
             ---BEGIN IMPORTANT CONTEXT---\nnote two\n---END IMPORTANT CONTEXT---\n\nhi"
        );
        Ok(())
    }

    #[test]
    fn trailing_system_message_becomes_its_own_user_turn() -> Result<()> {
        let mut thread = Thread::new();
        thread.push_message(flat(Role::System, "primary"));
        thread.push_message(flat(Role::User, "hi"));
        thread.push_message(flat(Role::System, "late note"));

        let request = adapter().to_request(&thread)?;
        let contents = request["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(
            contents[1]["parts"][0]["text"],
            "---BEGIN IMPORTANT CONTEXT---\nlate note\n---END IMPORTANT CONTEXT---"
        );
        Ok(())
    }

    #[test]
    fn response_roles_round_trip() -> Result<()> {
        let response = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Top of the morning" }] }
            }]
        });
        let messages = adapter().from_response(&response)?;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].text(), "Top of the morning");
        Ok(())
    }

    #[test]
    fn response_decodes_one_message_per_candidate() -> Result<()> {
        let response = json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "one" }] } },
                { "content": { "role": "model", "parts": [{ "text": "two" }] } }
            ]
        });
        let messages = adapter().from_response(&response)?;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "two");
        Ok(())
    }

    #[test]
    fn response_decodes_function_calls() -> Result<()> {
        let response = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "lookup", "args": { "q": "x" } } }]
                }
            }]
        });
        let messages = adapter().from_response(&response)?;
        assert_eq!(
            messages[0].content.parts()[0],
            Part::tool_call("lookup", json!({ "q": "x" }))
        );
        Ok(())
    }

    #[test]
    fn missing_candidates_is_decode_error() {
        let result = adapter().from_response(&json!({ "ok": true }));
        assert!(matches!(result, Err(ChatError::Decode(_))));
    }

    #[test]
    fn stream_chunk_decodes_candidate_text() -> Result<()> {
        let frame = r#"data: {"candidates":[{"index":0,"content":{"parts":[{"text":"Hel"}]}}]}"#;
        let delta = adapter().to_stream_chunk(frame)?;
        assert_eq!(delta, Some(ChatDelta::text(0, "Hel")));

        assert_eq!(adapter().to_stream_chunk("")?, None);
        assert_eq!(adapter().to_stream_chunk(": ping")?, None);
        Ok(())
    }

    #[test]
    fn safety_settings_can_be_disabled() -> Result<()> {
        let adapter = GeminiAdapter::new(GeminiConfig {
            model_key: "gemini-1.5-pro".into(),
            api_key: "k".into(),
            host: None,
            permissive_safety: false,
        });
        let mut thread = Thread::new();
        thread.push_message(flat(Role::User, "hi"));
        let request = adapter.to_request(&thread)?;
        assert!(request.get("safetySettings").is_none());
        Ok(())
    }

    #[test]
    fn endpoints_carry_the_key_and_switch_for_streaming() {
        let adapter = adapter();
        assert_eq!(
            adapter.endpoint(false),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent?key=test_key"
        );
        assert!(adapter.endpoint(true).contains(":streamGenerateContent?alt=sse"));
    }
}
