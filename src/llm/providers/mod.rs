//! LLM provider implementations.
//!
//! `build(config)` is the factory, called once at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod gemini;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct the configured `LlmProvider`.
pub fn build(config: &LlmConfig) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "gemini" => Ok(LlmProvider::Gemini(gemini::GeminiProvider::new(&config.gemini))),
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
