use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ChatError, Result};
use crate::providers::base::Capability;

/// Top-level adapter configuration:
/// `{ "adapter": "<name>", "<name>": { "model_key": ..., ... } }`.
/// Each vendor section stays opaque JSON until the owning adapter is
/// constructed, so unrelated sections can carry fields we know nothing
/// about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Name of the active adapter.
    pub adapter: String,
    #[serde(flatten)]
    pub sections: HashMap<String, Value>,
}

impl Settings {
    pub fn new<S: Into<String>>(adapter: S) -> Self {
        Settings {
            adapter: adapter.into(),
            sections: HashMap::new(),
        }
    }

    pub fn with_section<S: Into<String>>(mut self, name: S, section: Value) -> Self {
        self.sections.insert(name.into(), section);
        self
    }

    /// Deserialize the section for the given adapter name. Selecting a name
    /// with no section is a configuration error, not a translation error.
    pub fn section<C: DeserializeOwned>(&self, name: &str) -> Result<C> {
        let value = self.sections.get(name).ok_or_else(|| {
            ChatError::Configuration(format!("no configuration section for adapter '{}'", name))
        })?;
        serde_json::from_value(value.clone()).map_err(|e| {
            ChatError::Configuration(format!("invalid '{}' configuration: {}", name, e))
        })
    }
}

/// Configuration shared by the OpenAI-compatible family (OpenAI itself,
/// OpenRouter, Groq, xAI, LM Studio). `host` overrides the vendor default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub model_key: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Deployment name, not a public model id.
    pub model_key: String,
    pub api_key: String,
    pub resource_name: String,
    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
}

fn default_azure_api_version() -> String {
    "2024-02-01".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub model_key: String,
    pub api_key: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub model_key: String,
    pub api_key: String,
    #[serde(default)]
    pub host: Option<String>,
    /// Emit the four fixed safety categories at BLOCK_NONE. On by default,
    /// matching observed vendor behavior; setting this to false omits the
    /// safetySettings field and lets the vendor apply its own thresholds.
    #[serde(default = "default_true")]
    pub permissive_safety: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereConfig {
    pub model_key: String,
    pub api_key: String,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub model_key: String,
    #[serde(default)]
    pub host: Option<String>,
}

/// User-defined endpoint speaking the OpenAI chat-completions dialect.
/// Everything the built-in adapters hardcode is a field here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomConfig {
    pub model_key: String,
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_custom_path")]
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_custom_capabilities")]
    pub capabilities: Vec<Capability>,
}

fn default_custom_path() -> String {
    "/v1/chat/completions".to_string()
}

fn default_custom_capabilities() -> Vec<Capability> {
    vec![Capability::Streaming]
}
