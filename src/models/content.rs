use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ChatError, Result};

/// One typed segment of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    Image { url: String },
    ToolCall { name: String, arguments: Value },
    ToolResult { call_id: String, content: String },
}

impl Part {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn image<S: Into<String>>(url: S) -> Self {
        Part::Image { url: url.into() }
    }

    pub fn tool_call<S: Into<String>>(name: S, arguments: Value) -> Self {
        Part::ToolCall {
            name: name.into(),
            arguments,
        }
    }

    pub fn tool_result<S: Into<String>, T: Into<String>>(call_id: S, content: T) -> Self {
        Part::ToolResult {
            call_id: call_id.into(),
            content: content.into(),
        }
    }

    /// The text if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Message content as supplied by the collaborator: either one flat string
/// or an ordered sequence of typed parts. Both deserialize transparently;
/// [`Content::normalize`] collapses the string form so every adapter
/// consumes parts uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<Part>),
}

impl Content {
    /// Collapse a flat string into a single text part. A part sequence is
    /// left untouched, which makes this idempotent.
    pub fn normalize(self) -> Content {
        match self {
            Content::Text(text) => Content::Parts(vec![Part::text(text)]),
            parts @ Content::Parts(_) => parts,
        }
    }

    /// The parts view of this content without consuming it.
    pub fn parts(&self) -> Vec<Part> {
        match self {
            Content::Text(text) => vec![Part::text(text.clone())],
            Content::Parts(parts) => parts.clone(),
        }
    }

    /// All text segments joined with newlines. Non-text parts are skipped.
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(Part::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Decode content from loose JSON handed over by a collaborator.
    /// Anything that is neither a string nor a part sequence is rejected.
    pub fn from_value(value: &Value) -> Result<Content> {
        serde_json::from_value(value.clone()).map_err(|_| {
            ChatError::Validation(format!(
                "content must be a string or an array of parts, got: {}",
                value
            ))
        })
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}
