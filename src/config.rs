//! Configuration types.
//!
//! Everything is read from environment variables (a `.env` file is loaded
//! first by the binary). Mailbox and Sheets settings live next to their
//! clients: see `EmailConfig::from_env` and `SheetsConfig::from_env`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::pipeline::processor::{DEFAULT_RECENCY_MINUTES, DEFAULT_SUBJECT_FILTER, ProcessorConfig};
use crate::pipeline::window::{RunWindows, TickSchedule};
use crate::pitch::GeneratorConfig;

pub const DEFAULT_WATCH_CRON: &str = "0 */15 * * * *";
pub const DEFAULT_PERSONA_PATH: &str = "persona.json";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_LLM_FALLBACK_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Subject substring identifying digest emails.
    pub subject_filter: String,
    /// Digests older than this many minutes are ignored.
    pub recency_minutes: i64,
    /// Daily UTC windows in which `watch` may run.
    pub run_windows: RunWindows,
    /// Tick schedule for `watch`.
    pub watch_schedule: TickSchedule,
    /// Pause between consecutive replies.
    pub send_delay: Duration,
    pub keywords_path: Option<PathBuf>,
    pub persona_path: PathBuf,
    pub dynamic_persona: bool,
    pub db_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub llm_backend: LlmBackend,
    pub llm_api_key: Option<SecretString>,
    pub llm_base_url: Option<String>,
    pub llm_model: String,
    pub llm_fallback_model: Option<String>,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_backend = match get("HARO_LLM_BACKEND") {
            Some(v) => LlmBackend::from_str(&v)?,
            None => LlmBackend::default(),
        };
        let key_var = match llm_backend {
            LlmBackend::Groq => "GROQ_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        };

        let (default_model, default_fallback) = match llm_backend {
            LlmBackend::Groq => (DEFAULT_LLM_MODEL, Some(DEFAULT_LLM_FALLBACK_MODEL)),
            LlmBackend::OpenAi => (DEFAULT_OPENAI_MODEL, None),
        };

        // An explicitly empty fallback disables failover.
        let llm_fallback_model = match lookup("HARO_LLM_FALLBACK_MODEL") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v.trim().to_string()),
            None => default_fallback.map(str::to_string),
        };

        let recency_minutes: i64 = parse_or(&get, "HARO_RECENCY_MINUTES", DEFAULT_RECENCY_MINUTES)?;
        if recency_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "HARO_RECENCY_MINUTES".into(),
                message: "must be positive".into(),
            });
        }

        Ok(Self {
            subject_filter: get("HARO_SUBJECT_FILTER")
                .unwrap_or_else(|| DEFAULT_SUBJECT_FILTER.to_string()),
            recency_minutes,
            run_windows: RunWindows::parse(&get("HARO_RUN_WINDOWS").unwrap_or_default())?,
            watch_schedule: TickSchedule::parse(
                &get("HARO_WATCH_CRON").unwrap_or_else(|| DEFAULT_WATCH_CRON.to_string()),
            )?,
            send_delay: Duration::from_secs(parse_or(&get, "HARO_SEND_DELAY_SECS", 0u64)?),
            keywords_path: get("HARO_KEYWORDS_PATH").map(PathBuf::from),
            persona_path: get("HARO_PERSONA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PERSONA_PATH)),
            dynamic_persona: parse_or(&get, "HARO_DYNAMIC_PERSONA", true)?,
            db_path: get("HARO_DB_PATH").map(PathBuf::from),
            log_dir: get("HARO_LOG_DIR").map(PathBuf::from),
            llm_backend,
            llm_api_key: get(key_var).map(SecretString::from),
            llm_base_url: get("HARO_LLM_BASE_URL"),
            llm_model: get("HARO_LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
            llm_fallback_model,
        })
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            subject_filter: self.subject_filter.clone(),
            recency_window: chrono::Duration::minutes(self.recency_minutes),
            send_delay: self.send_delay,
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            dynamic_persona: self.dynamic_persona,
            ..GeneratorConfig::default()
        }
    }

    /// LLM settings; fails when the backend's API key is missing.
    pub fn llm_config(&self) -> Result<LlmConfig, ConfigError> {
        let api_key = self.llm_api_key.clone().ok_or_else(|| {
            ConfigError::MissingEnvVar(
                match self.llm_backend {
                    LlmBackend::Groq => "GROQ_API_KEY",
                    LlmBackend::OpenAi => "OPENAI_API_KEY",
                }
                .to_string(),
            )
        })?;

        Ok(LlmConfig {
            backend: self.llm_backend,
            api_key,
            base_url: self.llm_base_url.clone(),
            model: self.llm_model.clone(),
            fallback_model: self.llm_fallback_model.clone(),
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}
