use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{json, Value};

use super::base::{Adapter, Capability, ChatDelta};
use crate::errors::Result;
use crate::models::{Message, Thread};

/// A mock adapter with a fixed capability set, for dispatcher and registry
/// tests. Requests map to a trivial payload; responses echo a canned text.
pub struct MockAdapter {
    capabilities: HashSet<Capability>,
    pub requests_built: AtomicUsize,
}

impl MockAdapter {
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        MockAdapter {
            capabilities: capabilities.into_iter().collect(),
            requests_built: AtomicUsize::new(0),
        }
    }
}

impl Adapter for MockAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> HashSet<Capability> {
        self.capabilities.clone()
    }

    fn to_request(&self, thread: &Thread) -> Result<Value> {
        self.requests_built.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "thread": thread.id }))
    }

    fn from_response(&self, response: &Value) -> Result<Vec<Message>> {
        let text = response
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("mock reply");
        Ok(vec![Message::assistant().with_text(text)])
    }

    fn to_stream_chunk(&self, frame: &str) -> Result<Option<ChatDelta>> {
        if frame.is_empty() {
            return Ok(None);
        }
        Ok(Some(ChatDelta::text(0, frame)))
    }

    fn endpoint(&self, _stream: bool) -> String {
        "http://mock.invalid/chat".to_string()
    }

    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
