pub mod anthropic;
pub mod azure;
pub mod base;
pub mod cohere;
pub mod configs;
pub mod custom;
pub mod factory;
pub mod gemini;
pub mod groq;
pub mod lm_studio;
pub mod ollama;
pub mod open_router;
pub mod openai;
pub mod registry;
pub mod utils;
pub mod xai;

#[cfg(test)]
pub mod mock;
