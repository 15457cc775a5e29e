//! Error types for HARO Assist.
//!
//! The digest core (extraction, classification, filtering) has no error
//! type: it degrades to empty fields and empty results instead.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Mailbox channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to fetch from channel {name}: {reason}")]
    FetchFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Failed to update message {id} on channel {name}: {reason}")]
    UpdateFailed {
        name: String,
        id: String,
        reason: String,
    },

    #[error("Authentication failed for channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("No providers configured")]
    NoProviders,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome log errors. Always swallowed by the run orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OutcomeLogError {
    #[error("Sheets authentication failed: {0}")]
    Auth(String),

    #[error("Sheets request failed: {0}")]
    Request(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Channel fetch failed: {0}")]
    ChannelFetch(#[source] ChannelError),
}
