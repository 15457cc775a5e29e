//! Shared types for the digest pipeline.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, LlmError, OutcomeLogError};

// ── Query record ────────────────────────────────────────────────────

/// One journalist query extracted from a digest email.
///
/// Built once per `Summary:` block and never mutated afterwards. `reply_to`
/// always comes from the same block as the other fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Text after the `Summary:` label.
    pub title: String,
    /// Text after the `Category:` label (outlet or category).
    pub publication: String,
    /// Text after `Query:` up to `Requirements:` or the end of the block.
    pub query_text: String,
    /// First token after the `Email:` label; `None` when the block has none.
    pub reply_to: Option<String>,
}

impl QueryRecord {
    /// Whether the record has somewhere to send a reply.
    pub fn has_destination(&self) -> bool {
        self.reply_to.as_deref().is_some_and(|r| !r.is_empty())
    }
}

// ── Digest email ────────────────────────────────────────────────────

/// An unread digest message as supplied by the mailbox gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestEmail {
    /// Mailbox-native id, used for `mark_read`.
    pub id: String,
    /// Thread reference used for `In-Reply-To` / `References`.
    pub thread_id: String,
    pub subject: String,
    /// Decoded plain-text body.
    pub body: String,
    /// When the message was received, if known.
    pub timestamp: Option<DateTime<Utc>>,
}

// ── Outcomes ────────────────────────────────────────────────────────

/// What happened to a single query record during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    /// Reply generated and sent.
    Sent,
    /// No reply-to address; nothing generated or sent.
    Skipped,
    /// Generation or sending failed.
    Failed,
}

impl OutcomeStatus {
    /// Lowercase label for storage.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sent => "Sent",
            Self::Skipped => "Skipped",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Summary of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// The mailbox had no unread digests.
    NoUnreadDigests,
    /// Unread digests exist but none is inside the recency window.
    NoRecentDigest { skipped: usize },
    /// The chosen digest had no relevant queries; it was marked read.
    NoRelevantQueries { email_id: String },
    /// The chosen digest was processed and marked read.
    Processed {
        email_id: String,
        sent: usize,
        skipped: usize,
        failed: usize,
    },
}

impl RunReport {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoUnreadDigests => "no_unread_digests",
            Self::NoRecentDigest { .. } => "no_recent_digest",
            Self::NoRelevantQueries { .. } => "no_relevant_queries",
            Self::Processed { .. } => "processed",
        }
    }
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Mailbox access. Pure I/O: no parsing or filtering.
#[async_trait]
pub trait MailboxGateway: Send + Sync {
    /// Channel name for logging (e.g. "email").
    fn name(&self) -> &str;

    /// Fetch unread messages whose subject contains `subject_filter`.
    async fn fetch_unread(&self, subject_filter: &str) -> Result<Vec<DigestEmail>, ChannelError>;

    /// Mark a message as read so it is never processed again.
    async fn mark_read(&self, id: &str) -> Result<(), ChannelError>;

    /// Send a reply in the digest's thread to `destination`.
    async fn send_reply(
        &self,
        thread_id: &str,
        subject: &str,
        body: &str,
        destination: &str,
    ) -> Result<(), ChannelError>;
}

/// Produces the response text for a query record.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, query: &QueryRecord) -> Result<String, LlmError>;
}

/// Persists the outcome of each query record.
#[async_trait]
pub trait OutcomeLog: Send + Sync {
    /// Sink name, for logging.
    fn name(&self) -> &str;

    async fn record(
        &self,
        query: &QueryRecord,
        text: &str,
        status: OutcomeStatus,
    ) -> Result<(), OutcomeLogError>;
}
