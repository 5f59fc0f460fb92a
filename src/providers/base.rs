use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::errors::Result;
use crate::models::{Message, Part, Role, Thread};

/// A named feature an adapter may or may not support. The dispatcher checks
/// these before any network call and rejects requests the active vendor
/// cannot satisfy rather than silently dropping parts of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Tools,
    Images,
    Streaming,
    MultipleChoices,
}

/// An incremental piece of canonical output, assembled from one vendor
/// stream frame or one completed response choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDelta {
    pub choice_index: usize,
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ChatDelta {
    pub fn text<S: Into<String>>(choice_index: usize, text: S) -> Self {
        ChatDelta {
            choice_index,
            role: Role::Assistant,
            parts: vec![Part::text(text)],
        }
    }

    pub fn from_message(choice_index: usize, message: &Message) -> Self {
        ChatDelta {
            choice_index,
            role: message.role,
            parts: message.content.parts(),
        }
    }
}

/// Base trait for vendor adapters (OpenAI, Anthropic, Gemini, etc).
///
/// All translation is synchronous and side-effect-free: an adapter holds
/// configuration but no per-conversation state, so one instance can serve
/// concurrent threads. The dispatcher owns all I/O.
pub trait Adapter: Send + Sync {
    /// The configuration key this adapter is registered under.
    fn name(&self) -> &'static str;

    /// Features this vendor can satisfy.
    fn capabilities(&self) -> HashSet<Capability>;

    /// Build the vendor request payload. Pure; must not mutate the thread.
    fn to_request(&self, thread: &Thread) -> Result<Value>;

    /// Decode a complete (non-streamed) vendor response into canonical
    /// messages, one per returned choice.
    fn from_response(&self, response: &Value) -> Result<Vec<Message>>;

    /// Decode one transport frame. `None` means the frame carried no
    /// content (keep-alive, event preamble, done sentinel).
    fn to_stream_chunk(&self, frame: &str) -> Result<Option<ChatDelta>>;

    /// Adjust a built payload for a streaming transport. Most vendors flag
    /// streaming in the request body; vendors that switch endpoints instead
    /// override this to the identity.
    fn streaming_payload(&self, mut payload: Value) -> Value {
        payload["stream"] = Value::Bool(true);
        payload
    }

    /// The URL the request payload is posted to.
    fn endpoint(&self, stream: bool) -> String;

    /// Request headers, including whatever credential scheme the vendor
    /// uses. Credentials come from configuration; the core only carries
    /// them.
    fn headers(&self) -> Vec<(String, String)>;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}
