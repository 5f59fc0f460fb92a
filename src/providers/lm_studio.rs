use std::collections::HashSet;

use serde_json::Value;

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::ApiConfig;
use super::openai::chat_payload;
use super::utils::{check_error_object, openai_chunk_to_delta, openai_response_to_messages};
use crate::errors::Result;
use crate::models::{Message, Thread};

pub const LM_STUDIO_HOST: &str = "http://localhost:1234";

/// LM Studio's local server speaks the OpenAI dialect without
/// authentication; tool support depends on the loaded model, so only
/// streaming is advertised.
pub struct LmStudioAdapter {
    config: ApiConfig,
}

impl LmStudioAdapter {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl Adapter for LmStudioAdapter {
    fn name(&self) -> &'static str {
        "lm_studio"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::from([Capability::Streaming])
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
        let host = self.config.host.as_deref().unwrap_or(LM_STUDIO_HOST);
        format!("{}/v1/chat/completions", host.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
