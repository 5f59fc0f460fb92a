use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, Role};
use super::tool::ToolDeclaration;
use crate::errors::{ChatError, Result};

/// Conversation-scoped generation parameters. Everything is optional on
/// input; defaults are owned by each adapter because vendors disagree on
/// what a safe default is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stop_sequences: Vec<String>,
    /// Candidate count: how many alternative completions to request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

/// One role's contribution at a position in the conversation. A turn may
/// carry several messages when the vendor returned alternative completions;
/// the position inside the turn is the choice index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub messages: Vec<Message>,
}

impl Turn {
    pub fn new(message: Message) -> Self {
        Turn {
            messages: vec![message],
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.messages.first().map(|m| m.role)
    }

    /// Add an alternative choice. All messages in a turn share one role.
    pub fn push_choice(&mut self, message: Message) -> Result<()> {
        if let Some(role) = self.role() {
            if role != message.role {
                return Err(ChatError::Validation(format!(
                    "turn already holds {:?} messages, cannot add {:?}",
                    role, message.role
                )));
            }
        }
        self.messages.push(message);
        Ok(())
    }

    /// The first (primary) choice of this turn.
    pub fn primary(&self) -> Option<&Message> {
        self.messages.first()
    }
}

/// An ordered conversation plus its generation parameters and declared
/// tools. Cheap to clone; the dispatcher snapshots a thread at request
/// start so mutation mid-flight cannot corrupt an in-progress translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub config: GenerationConfig,
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
}

impl Thread {
    pub fn new() -> Self {
        Thread {
            id: Uuid::new_v4().to_string(),
            turns: Vec::new(),
            config: GenerationConfig::default(),
            tools: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tool(mut self, tool: ToolDeclaration) -> Self {
        self.tools.push(tool);
        self
    }

    /// Append a message as a new turn.
    pub fn push_message(&mut self, message: Message) {
        self.turns.push(Turn::new(message));
    }

    /// Append one completion choice at the given turn, creating the turn
    /// when it is the next position.
    pub fn push_choice(&mut self, turn_index: usize, message: Message) -> Result<()> {
        if turn_index == self.turns.len() {
            self.turns.push(Turn::new(message));
            return Ok(());
        }
        let turn_count = self.turns.len();
        let turn = self.turns.get_mut(turn_index).ok_or_else(|| {
            ChatError::Validation(format!(
                "turn index {} out of range ({} turns)",
                turn_index, turn_count
            ))
        })?;
        turn.push_choice(message)
    }

    /// Look up a message by its (turn, choice) coordinate.
    pub fn message_at(&self, turn_index: usize, choice_index: usize) -> Option<&Message> {
        self.turns.get(turn_index)?.messages.get(choice_index)
    }

    /// The primary-choice view of the conversation, in order. This is what
    /// adapters translate: alternative choices are history bookkeeping, not
    /// part of the next request.
    pub fn messages(&self) -> Vec<&Message> {
        self.turns.iter().filter_map(Turn::primary).collect()
    }

    /// Whether any message in the primary view carries an image part.
    pub fn has_images(&self) -> bool {
        self.messages().iter().any(|m| m.has_image())
    }
}

impl Default for Thread {
    fn default() -> Self {
        Thread::new()
    }
}
