use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{Content, Part};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

/// A message to or from a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    pub created: i64,
}

impl Message {
    pub fn new(role: Role, content: Content) -> Self {
        Message {
            role,
            content,
            created: Utc::now().timestamp(),
        }
    }

    /// Create a new system message with the current timestamp
    pub fn system() -> Self {
        Message::new(Role::System, Content::Parts(Vec::new()))
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message::new(Role::User, Content::Parts(Vec::new()))
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message::new(Role::Assistant, Content::Parts(Vec::new()))
    }

    /// Create a new tool message with the current timestamp
    pub fn tool() -> Self {
        Message::new(Role::Tool, Content::Parts(Vec::new()))
    }

    /// Append any part to the message, collapsing flat content first.
    pub fn with_part(mut self, part: Part) -> Self {
        let mut parts = match self.content.normalize() {
            Content::Parts(parts) => parts,
            Content::Text(_) => unreachable!("normalize always yields parts"),
        };
        parts.push(part);
        self.content = Content::Parts(parts);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_part(Part::text(text))
    }

    /// Add an image reference to the message
    pub fn with_image<S: Into<String>>(self, url: S) -> Self {
        self.with_part(Part::image(url))
    }

    /// Add a tool call to the message
    pub fn with_tool_call<S: Into<String>>(self, name: S, arguments: Value) -> Self {
        self.with_part(Part::tool_call(name, arguments))
    }

    /// Add a tool result to the message
    pub fn with_tool_result<S: Into<String>, T: Into<String>>(
        self,
        call_id: S,
        content: T,
    ) -> Self {
        self.with_part(Part::tool_result(call_id, content))
    }

    /// The concatenated text of the message.
    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn has_tool_call(&self) -> bool {
        self.content
            .parts()
            .iter()
            .any(|p| matches!(p, Part::ToolCall { .. }))
    }

    pub fn has_image(&self) -> bool {
        self.content
            .parts()
            .iter()
            .any(|p| matches!(p, Part::Image { .. }))
    }
}
