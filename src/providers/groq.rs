use std::collections::HashSet;

use serde_json::Value;

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::ApiConfig;
use super::openai::{bearer_headers, chat_payload};
use super::utils::{check_error_object, openai_chunk_to_delta, openai_response_to_messages};
use crate::errors::Result;
use crate::models::{Message, Thread};

pub const GROQ_HOST: &str = "https://api.groq.com";

/// Groq speaks the OpenAI dialect on its own host. No image input and no
/// multi-choice sampling.
pub struct GroqAdapter {
    config: ApiConfig,
}

impl GroqAdapter {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl Adapter for GroqAdapter {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::from([Capability::Tools, Capability::Streaming])
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
        let host = self.config.host.as_deref().unwrap_or(GROQ_HOST);
        format!(
            "{}/openai/v1/chat/completions",
            host.trim_end_matches('/')
        )
    }

    fn headers(&self) -> Vec<(String, String)> {
        bearer_headers(&self.config.api_key)
    }
}
