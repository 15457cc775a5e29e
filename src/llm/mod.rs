//! LLM integration for HARO Assist.
//!
//! Supports any OpenAI-compatible chat-completions endpoint:
//! - **Groq**: default backend (`https://api.groq.com/openai/v1`)
//! - **OpenAI**: `https://api.openai.com/v1`
//!
//! When a fallback model is configured the primary is wrapped in a
//! `FailoverProvider` so a failed request retries once on the smaller model.

pub mod chat_completions;
pub mod failover;
pub mod provider;

pub use chat_completions::ChatCompletionsProvider;
pub use failover::FailoverProvider;
pub use provider::*;

use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ConfigError, LlmError};

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmBackend {
    #[default]
    Groq,
    OpenAi,
}

impl LlmBackend {
    /// Short provider name, used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl FromStr for LlmBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::InvalidValue {
                key: "HARO_LLM_BACKEND".into(),
                message: format!("unknown backend '{other}', expected groq or openai"),
            }),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    /// Overrides the backend's default API root.
    pub base_url: Option<String>,
    pub model: String,
    pub fallback_model: Option<String>,
}

impl LlmConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.backend.default_base_url())
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let build = |model: &str| -> Arc<dyn LlmProvider> {
        Arc::new(ChatCompletionsProvider::new(
            config.backend.name(),
            config.base_url(),
            config.api_key.clone(),
            model,
        ))
    };

    let primary = build(&config.model);
    match config.fallback_model.as_deref().filter(|m| !m.is_empty()) {
        Some(fallback) if fallback != config.model => {
            tracing::info!(
                "Using {} (model: {}, fallback: {})",
                config.backend.name(),
                config.model,
                fallback
            );
            Ok(Arc::new(FailoverProvider::new(vec![primary, build(fallback)])?))
        }
        _ => {
            tracing::info!("Using {} (model: {})", config.backend.name(), config.model);
            Ok(primary)
        }
    }
}
