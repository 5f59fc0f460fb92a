use std::collections::HashSet;

use serde_json::Value;

use super::base::{Adapter, Capability, ChatDelta};
use super::configs::ApiConfig;
use super::openai::{bearer_headers, chat_payload};
use super::utils::{check_error_object, openai_chunk_to_delta, openai_response_to_messages};
use crate::errors::Result;
use crate::models::{Message, Thread};

pub const XAI_HOST: &str = "https://api.x.ai";

/// xAI (Grok) speaks the OpenAI dialect on its own host.
pub struct XaiAdapter {
    config: ApiConfig,
}

impl XaiAdapter {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl Adapter for XaiAdapter {
    fn name(&self) -> &'static str {
        "xai"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::from([Capability::Tools, Capability::Images, Capability::Streaming])
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
        let host = self.config.host.as_deref().unwrap_or(XAI_HOST);
        format!("{}/v1/chat/completions", host.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(String, String)> {
        bearer_headers(&self.config.api_key)
    }
}
