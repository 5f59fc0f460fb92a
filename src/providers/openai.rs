use std::collections::HashSet;

use serde_json::{json, Value};

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::ApiConfig;
use super::utils::{
    check_error_object, messages_to_openai_spec, openai_chunk_to_delta,
    openai_response_to_messages, tools_to_openai_spec,
};
use crate::errors::Result;
use crate::models::{Message, Thread};

pub const OPENAI_HOST: &str = "https://api.openai.com";

pub struct OpenAiAdapter {
    config: ApiConfig,
}

impl OpenAiAdapter {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

/// Build a chat-completions payload from a thread. Shared by every adapter
/// speaking the OpenAI dialect; generation parameters pass through without
/// invented defaults, absent fields are simply omitted.
pub(crate) fn chat_payload(model: &str, thread: &Thread) -> Result<Value> {
    let messages = messages_to_openai_spec(&thread.messages())?;

    let mut payload = json!({
        "model": model,
        "messages": messages,
    });
    let body = payload.as_object_mut().expect("payload is an object");

    let config = &thread.config;
    if let Some(temperature) = config.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = config.top_p {
        body.insert("top_p".into(), json!(top_p));
    }
    if let Some(max_tokens) = config.max_tokens {
        body.insert("max_tokens".into(), json!(max_tokens));
    }
    if !config.stop_sequences.is_empty() {
        body.insert("stop".into(), json!(config.stop_sequences));
    }
    if let Some(n) = config.n {
        body.insert("n".into(), json!(n));
    }

    if !thread.tools.is_empty() {
        body.insert("tools".into(), json!(tools_to_openai_spec(&thread.tools)?));
    }

    Ok(payload)
}

/// Bearer-token headers used across the OpenAI-compatible family.
pub(crate) fn bearer_headers(api_key: &str) -> Vec<(String, String)> {
    vec![("Authorization".to_string(), format!("Bearer {}", api_key))]
}

impl Adapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::from([
            Capability::Tools,
            Capability::Images,
            Capability::Streaming,
            Capability::MultipleChoices,
        ])
    }

    fn to_request(&self, thread: &Thread) -> Result<Value> {
        chat_payload(&self.config.model_key, thread)
    }

    fn from_response(&self, response: &Value) -> Result<Vec<Message>> {
        if let Some(error) = check_error_object(response) {
            return Err(error);
        }
        openai_response_to_messages(response)
    }

    fn to_stream_chunk(&self, frame: &str) -> Result<Option<ChatDelta>> {
        openai_chunk_to_delta(frame)
    }

    fn endpoint(&self, _stream: bool) -> String {
        let host = self.config.host.as_deref().unwrap_or(OPENAI_HOST);
        format!("{}/v1/chat/completions", host.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(String, String)> {
        bearer_headers(&self.config.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ChatError;
    use crate::models::{GenerationConfig, ToolDeclaration};

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(ApiConfig {
            model_key: "gpt-4o-mini".into(),
            api_key: "test_key".into(),
            host: None,
        })
    }

    fn thread_with(config: GenerationConfig) -> Thread {
        let mut thread = Thread::new().with_config(config);
        thread.push_message(Message::user().with_text("Hello"));
        thread
    }

    #[test]
    fn request_passes_parameters_through_without_defaults() -> Result<()> {
        let request = adapter().to_request(&thread_with(GenerationConfig {
            temperature: Some(0.2),
            n: Some(3),
            ..Default::default()
        }))?;

        assert_eq!(request["model"], "gpt-4o-mini");
        assert_eq!(request["temperature"], 0.2);
        assert_eq!(request["n"], 3);
        assert!(request.get("top_p").is_none());
        assert!(request.get("max_tokens").is_none());
        assert!(request.get("stop").is_none());
        Ok(())
    }

    #[test]
    fn request_carries_tools_unchanged() -> Result<()> {
        let thread = thread_with(GenerationConfig::default()).with_tool(ToolDeclaration::new(
            "lookup",
            "Semantic search",
            serde_json::json!({ "type": "object" }),
        ));
        let request = adapter().to_request(&thread)?;

        assert_eq!(request["tools"][0]["function"]["name"], "lookup");
        assert_eq!(request["tools"][0]["type"], "function");
        Ok(())
    }

    #[test]
    fn error_object_surfaces_as_vendor_error() {
        let response = serde_json::json!({
            "error": { "type": "authentication_error", "message": "bad key" }
        });
        let result = adapter().from_response(&response);
        assert!(matches!(result, Err(ChatError::Vendor { .. })));
    }

    #[test]
    fn endpoint_honors_host_override() {
        let adapter = OpenAiAdapter::new(ApiConfig {
            model_key: "m".into(),
            api_key: "k".into(),
            host: Some("http://localhost:9999/".into()),
        });
        assert_eq!(
            adapter.endpoint(false),
            "http://localhost:9999/v1/chat/completions"
        );
    }
}
