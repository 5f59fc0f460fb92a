use regex::Regex;
use serde_json::{json, Value};

use crate::errors::{ChatError, Result, VendorErrorKind};
use crate::models::{Message, Part, Role, ToolDeclaration};
use crate::providers::base::ChatDelta;

/// Convert canonical messages to the OpenAI chat-completions message spec.
/// This dialect is shared by OpenAI, Azure, OpenRouter, Groq, xAI, LM Studio,
/// Ollama's compatibility endpoint, and user-defined custom endpoints.
pub fn messages_to_openai_spec(messages: &[&Message]) -> Result<Vec<Value>> {
    let mut spec = Vec::new();

    for message in messages {
        let parts = message.content.parts();

        // Tool results become their own "tool" role entries.
        let mut tool_results = Vec::new();
        let mut content_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in &parts {
            match part {
                Part::Text { text } => {
                    content_parts.push(json!({ "type": "text", "text": text }));
                }
                Part::Image { url } => {
                    content_parts.push(json!({
                        "type": "image_url",
                        "image_url": { "url": url }
                    }));
                }
                Part::ToolCall { name, arguments } => {
                    tool_calls.push(json!({
                        "id": format!("call_{}", tool_calls.len()),
                        "type": "function",
                        "function": {
                            "name": sanitize_function_name(name),
                            "arguments": arguments.to_string(),
                        }
                    }));
                }
                Part::ToolResult { call_id, content } => {
                    tool_results.push(json!({
                        "role": "tool",
                        "content": content,
                        "tool_call_id": call_id,
                    }));
                }
            }
        }

        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let mut converted = json!({ "role": role });

        // A single text part stays a flat string. Mixed parts keep the
        // ordered array form.
        if content_parts.len() == 1 && parts.iter().all(|p| matches!(p, Part::Text { .. })) {
            converted["content"] = content_parts[0]["text"].clone();
        } else if !content_parts.is_empty() {
            converted["content"] = json!(content_parts);
        }
        if !tool_calls.is_empty() {
            converted["tool_calls"] = json!(tool_calls);
        }

        if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
            spec.push(converted);
        }
        spec.extend(tool_results);
    }

    Ok(spec)
}

/// Convert canonical tool declarations to the OpenAI tool spec.
pub fn tools_to_openai_spec(tools: &[ToolDeclaration]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(ChatError::Validation(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Decode an OpenAI chat-completions response into canonical messages, one
/// per returned choice.
pub fn openai_response_to_messages(response: &Value) -> Result<Vec<Message>> {
    let choices = response
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ChatError::Decode("response has no choices array".into()))?;

    let mut messages = Vec::new();
    for choice in choices {
        let original = &choice["message"];
        let mut message = Message::assistant();

        if let Some(text) = original.get("content").and_then(|c| c.as_str()) {
            if !text.is_empty() {
                message = message.with_text(text);
            }
        }

        if let Some(tool_calls) = original.get("tool_calls").and_then(|t| t.as_array()) {
            for tool_call in tool_calls {
                let name = tool_call["function"]["name"].as_str().unwrap_or_default();
                let arguments = tool_call["function"]["arguments"]
                    .as_str()
                    .unwrap_or_default();

                if !is_valid_function_name(name) {
                    return Err(ChatError::Decode(format!(
                        "invalid function name in tool call: '{}'",
                        name
                    )));
                }
                let parsed: Value = serde_json::from_str(arguments).map_err(|e| {
                    ChatError::Decode(format!(
                        "could not parse tool call arguments for '{}': {}",
                        name, e
                    ))
                })?;
                message = message.with_tool_call(name, parsed);
            }
        }

        messages.push(message);
    }

    if messages.is_empty() {
        return Err(ChatError::Decode("response carried no choices".into()));
    }
    Ok(messages)
}

/// Decode one OpenAI-dialect SSE frame into a delta. `None` for keep-alives,
/// event preambles, the `[DONE]` sentinel, and frames without content.
pub fn openai_chunk_to_delta(frame: &str) -> Result<Option<ChatDelta>> {
    let data = match sse_data(frame) {
        Some(data) => data,
        None => return Ok(None),
    };
    if data == "[DONE]" {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(data)
        .map_err(|e| ChatError::Decode(format!("malformed stream frame: {}", e)))?;

    let choice = match value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        Some(choice) => choice,
        None => return Ok(None),
    };
    let choice_index = choice.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize;

    match choice["delta"].get("content").and_then(|c| c.as_str()) {
        Some(text) if !text.is_empty() => Ok(Some(ChatDelta::text(choice_index, text))),
        _ => Ok(None),
    }
}

/// Extract the payload of a server-sent-events frame. Returns `None` for
/// blank lines, comments, and `event:`/`id:` preambles. A frame with no
/// field prefix is passed through as-is so newline-delimited JSON streams
/// (Ollama) share this path.
pub fn sse_data(frame: &str) -> Option<&str> {
    let frame = frame.trim();
    if frame.is_empty() || frame.starts_with(':') {
        return None;
    }
    if let Some(data) = frame.strip_prefix("data:") {
        return Some(data.trim_start());
    }
    if frame.starts_with("event:") || frame.starts_with("id:") || frame.starts_with("retry:") {
        return None;
    }
    Some(frame)
}

/// Normalize a vendor HTTP failure into the error taxonomy. The message is
/// the vendor's own wording where the body carries one.
pub fn decode_vendor_error(status: u16, body: &str) -> ChatError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string());

    ChatError::Vendor {
        kind: VendorErrorKind::from_status(status),
        message: format!("{}: {}", status, message),
    }
}

/// Some vendors report failures inside an HTTP 200 body. Detect the
/// OpenAI-style `error` object.
pub fn check_error_object(response: &Value) -> Option<ChatError> {
    let error = response.get("error")?;
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown vendor error")
        .to_string();
    let kind = match error.get("type").and_then(|t| t.as_str()) {
        Some("insufficient_quota") | Some("rate_limit_exceeded") => VendorErrorKind::RateLimit,
        Some("invalid_request_error") => VendorErrorKind::InvalidRequest,
        Some("authentication_error") => VendorErrorKind::Auth,
        _ => VendorErrorKind::Other,
    };
    Some(ChatError::Vendor { kind, message })
}

pub fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    re.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    re.is_match(name)
}
