use std::collections::HashSet;

use serde_json::Value;

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::CustomConfig;
use super::openai::chat_payload;
use super::utils::{check_error_object, openai_chunk_to_delta, openai_response_to_messages};
use crate::errors::Result;
use crate::models::{Message, Thread};

/// A user-defined endpoint speaking the OpenAI chat-completions dialect.
/// Host, path, headers, and the advertised capability set all come from
/// configuration; nothing here is hardcoded to a vendor.
pub struct CustomAdapter {
    config: CustomConfig,
}

impl CustomAdapter {
    pub fn new(config: CustomConfig) -> Self {
        Self { config }
    }
}

impl Adapter for CustomAdapter {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        self.config.capabilities.iter().copied().collect()
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
        format!(
            "{}{}",
            self.config.host.trim_end_matches('/'),
            self.config.path
        )
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(api_key) = &self.config.api_key {
            headers.push(("Authorization".to_string(), format!("Bearer {}", api_key)));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn everything_comes_from_configuration() {
        let adapter = CustomAdapter::new(CustomConfig {
            model_key: "my-model".into(),
            host: "http://gateway.internal:8000".into(),
            api_key: Some("secret".into()),
            path: "/llm/v1/chat".into(),
            headers: HashMap::from([("x-team".to_string(), "search".to_string())]),
            capabilities: vec![Capability::Streaming, Capability::Tools],
        });

        assert_eq!(
            adapter.endpoint(false),
            "http://gateway.internal:8000/llm/v1/chat"
        );
        assert!(adapter.supports(Capability::Tools));
        assert!(!adapter.supports(Capability::Images));

        let headers = adapter.headers();
        assert!(headers.contains(&("x-team".to_string(), "search".to_string())));
        assert!(headers.contains(&("Authorization".to_string(), "Bearer secret".to_string())));
    }
}
