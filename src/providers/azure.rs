use std::collections::HashSet;

use serde_json::Value;

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::AzureConfig;
use super::openai::chat_payload;
use super::utils::{check_error_object, openai_chunk_to_delta, openai_response_to_messages};
use crate::errors::Result;
use crate::models::{Message, Thread};

/// Azure OpenAI: the chat-completions dialect behind a deployment-scoped
/// URL and an `api-key` header instead of a bearer token.
pub struct AzureAdapter {
    config: AzureConfig,
}

impl AzureAdapter {
    pub fn new(config: AzureConfig) -> Self {
        Self { config }
    }
}

impl Adapter for AzureAdapter {
    fn name(&self) -> &'static str {
        "azure"
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
        let mut payload = chat_payload(&self.config.model_key, thread)?;
        // The deployment in the URL selects the model.
        payload
            .as_object_mut()
            .expect("payload is an object")
            .remove("model");
        Ok(payload)
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
            "https://{}.openai.azure.com/openai/deployments/{}/chat/completions?api-version={}",
            self.config.resource_name, self.config.model_key, self.config.api_version
        )
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![("api-key".to_string(), self.config.api_key.clone())]
    }
}
