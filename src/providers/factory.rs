use std::str::FromStr;
use std::sync::Arc;

use strum_macros::{Display, EnumIter, EnumString};

use super::anthropic::AnthropicAdapter;
use super::azure::AzureAdapter;
use super::base::Adapter;
use super::cohere::CohereAdapter;
use super::configs::Settings;
use super::custom::CustomAdapter;
use super::gemini::GeminiAdapter;
use super::groq::GroqAdapter;
use super::lm_studio::LmStudioAdapter;
use super::ollama::OllamaAdapter;
use super::open_router::OpenRouterAdapter;
use super::openai::OpenAiAdapter;
use super::xai::XaiAdapter;
use crate::errors::{ChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AdapterKind {
    #[strum(serialize = "openai")]
    OpenAi,
    Azure,
    Anthropic,
    Gemini,
    Cohere,
    OpenRouter,
    Ollama,
    LmStudio,
    Groq,
    Xai,
    Custom,
}

/// Construct the adapter named in the settings. Each adapter reads its own
/// section; a missing or malformed section is a configuration error raised
/// here, long before any request.
pub fn build_adapter(settings: &Settings) -> Result<Arc<dyn Adapter>> {
    let name = settings.adapter.as_str();
    let kind = AdapterKind::from_str(name)
        .map_err(|_| ChatError::Configuration(format!("unknown adapter '{}'", name)))?;

    let adapter: Arc<dyn Adapter> = match kind {
        AdapterKind::OpenAi => Arc::new(OpenAiAdapter::new(settings.section(name)?)),
        AdapterKind::Azure => Arc::new(AzureAdapter::new(settings.section(name)?)),
        AdapterKind::Anthropic => Arc::new(AnthropicAdapter::new(settings.section(name)?)),
        AdapterKind::Gemini => Arc::new(GeminiAdapter::new(settings.section(name)?)),
        AdapterKind::Cohere => Arc::new(CohereAdapter::new(settings.section(name)?)),
        AdapterKind::OpenRouter => Arc::new(OpenRouterAdapter::new(settings.section(name)?)),
        AdapterKind::Ollama => Arc::new(OllamaAdapter::new(settings.section(name)?)),
        AdapterKind::LmStudio => Arc::new(LmStudioAdapter::new(settings.section(name)?)),
        AdapterKind::Groq => Arc::new(GroqAdapter::new(settings.section(name)?)),
        AdapterKind::Xai => Arc::new(XaiAdapter::new(settings.section(name)?)),
        AdapterKind::Custom => Arc::new(CustomAdapter::new(settings.section(name)?)),
    };
    Ok(adapter)
}
