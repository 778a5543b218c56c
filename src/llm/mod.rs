//! LLM integration for the conversational intake agent.
//!
//! The agent treats the model as a black box behind the [`LlmProvider`]
//! trait; the concrete provider speaks the Anthropic Messages API over
//! reqwest. Engine operations are exposed to the model as tools — the
//! model never touches session state directly.

pub mod anthropic;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use provider::*;

use std::sync::Arc;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = AnthropicProvider::new(config.api_key.clone(), config.model.clone());
    tracing::info!(model = %config.model, "Using Anthropic");
    Ok(Arc::new(provider))
}
