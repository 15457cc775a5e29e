//! Digest processor — drives one run of the HARO workflow.
//!
//! Flow:
//! 1. Fetch unread digests from the mailbox
//! 2. Pick the newest digest inside the recency window
//! 3. Parse + filter it (`DigestFilter`)
//! 4. Per relevant query: generate a pitch, send it, log the outcome
//! 5. Mark the digest read and stop (one digest per run)

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::pipeline::digest::DigestFilter;
use crate::pipeline::types::{
    DigestEmail, MailboxGateway, OutcomeLog, OutcomeStatus, QueryRecord, ResponseGenerator,
    RunReport,
};
use crate::pipeline::window::is_recent;

/// Default recency window for digests.
pub const DEFAULT_RECENCY_MINUTES: i64 = 30;

/// Default subject filter for digest emails.
pub const DEFAULT_SUBJECT_FILTER: &str = "HARO";

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Substring identifying digest emails by subject.
    pub subject_filter: String,
    /// Digests older than this are ignored.
    pub recency_window: chrono::Duration,
    /// Pause between consecutive replies.
    pub send_delay: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            subject_filter: DEFAULT_SUBJECT_FILTER.to_string(),
            recency_window: chrono::Duration::minutes(DEFAULT_RECENCY_MINUTES),
            send_delay: Duration::ZERO,
        }
    }
}

/// Per-digest tallies.
#[derive(Debug, Default)]
struct Tally {
    sent: usize,
    skipped: usize,
    failed: usize,
}

/// Runs the digest workflow against its collaborators.
pub struct DigestProcessor {
    mailbox: Arc<dyn MailboxGateway>,
    generator: Arc<dyn ResponseGenerator>,
    outcome_log: Arc<dyn OutcomeLog>,
    filter: DigestFilter,
    config: ProcessorConfig,
}

impl DigestProcessor {
    /// Create a new processor.
    pub fn new(
        mailbox: Arc<dyn MailboxGateway>,
        generator: Arc<dyn ResponseGenerator>,
        outcome_log: Arc<dyn OutcomeLog>,
        filter: DigestFilter,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            mailbox,
            generator,
            outcome_log,
            filter,
            config,
        }
    }

    /// Run once against the mailbox as of `now`.
    ///
    /// Only a mailbox fetch failure fails the run. Everything after that is
    /// logged and tallied.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        info!(
            channel = self.mailbox.name(),
            filter = %self.config.subject_filter,
            "Checking for digest emails"
        );

        let mut emails = self
            .mailbox
            .fetch_unread(&self.config.subject_filter)
            .await
            .map_err(PipelineError::ChannelFetch)?;

        if emails.is_empty() {
            info!("No unread digest emails found");
            return Ok(RunReport::NoUnreadDigests);
        }

        // Newest first; undated messages sort last.
        emails.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut skipped = 0;
        for email in &emails {
            if !is_recent(email.timestamp, now, self.config.recency_window) {
                debug!(
                    email_id = %email.id,
                    timestamp = ?email.timestamp,
                    "Skipping digest outside recency window"
                );
                skipped += 1;
                continue;
            }

            info!(
                email_id = %email.id,
                subject = %email.subject,
                timestamp = ?email.timestamp,
                "Found recent digest email"
            );
            return Ok(self.process_digest(email).await);
        }

        info!(skipped, "No digest emails within the recency window");
        Ok(RunReport::NoRecentDigest { skipped })
    }

    /// Process a single digest: every relevant query, then mark read.
    async fn process_digest(&self, email: &DigestEmail) -> RunReport {
        let queries = self.filter.parse(&email.body);

        if queries.is_empty() {
            warn!(email_id = %email.id, "Digest has no relevant queries");
            self.mark_read(email).await;
            return RunReport::NoRelevantQueries {
                email_id: email.id.clone(),
            };
        }

        info!(email_id = %email.id, count = queries.len(), "Processing relevant queries");

        let mut tally = Tally::default();
        for (i, query) in queries.iter().enumerate() {
            if i > 0 && !self.config.send_delay.is_zero() && tally.sent > 0 {
                tokio::time::sleep(self.config.send_delay).await;
            }

            match self.process_query(email, query).await {
                OutcomeStatus::Sent => tally.sent += 1,
                OutcomeStatus::Skipped => tally.skipped += 1,
                OutcomeStatus::Failed => tally.failed += 1,
            }
        }

        self.mark_read(email).await;

        info!(
            email_id = %email.id,
            sent = tally.sent,
            skipped = tally.skipped,
            failed = tally.failed,
            "Digest processed; stopping until next run"
        );

        RunReport::Processed {
            email_id: email.id.clone(),
            sent: tally.sent,
            skipped: tally.skipped,
            failed: tally.failed,
        }
    }

    /// Generate, send and log a single query. Never fails the run.
    async fn process_query(&self, email: &DigestEmail, query: &QueryRecord) -> OutcomeStatus {
        let Some(reply_to) = query.reply_to.as_deref().filter(|r| !r.is_empty()) else {
            warn!(title = %query.title, "Query has no reply-to address, skipping");
            self.log_outcome(query, "", OutcomeStatus::Skipped).await;
            return OutcomeStatus::Skipped;
        };

        let pitch = match self.generator.generate(query).await {
            Ok(pitch) => pitch,
            Err(e) => {
                error!(title = %query.title, error = %e, "Pitch generation failed");
                self.log_outcome(query, "", OutcomeStatus::Failed).await;
                return OutcomeStatus::Failed;
            }
        };

        match self
            .mailbox
            .send_reply(&email.thread_id, &email.subject, &pitch, reply_to)
            .await
        {
            Ok(()) => {
                info!(title = %query.title, reply_to, "Pitch sent");
                self.log_outcome(query, &pitch, OutcomeStatus::Sent).await;
                OutcomeStatus::Sent
            }
            Err(e) => {
                error!(title = %query.title, reply_to, error = %e, "Failed to send pitch");
                self.log_outcome(query, &pitch, OutcomeStatus::Failed).await;
                OutcomeStatus::Failed
            }
        }
    }

    async fn log_outcome(&self, query: &QueryRecord, text: &str, status: OutcomeStatus) {
        if let Err(e) = self.outcome_log.record(query, text, status).await {
            warn!(title = %query.title, %status, error = %e, "Failed to log outcome, continuing");
        }
    }

    async fn mark_read(&self, email: &DigestEmail) {
        match self.mailbox.mark_read(&email.id).await {
            Ok(()) => debug!(email_id = %email.id, "Marked digest as read"),
            Err(e) => warn!(email_id = %email.id, error = %e, "Failed to mark digest as read"),
        }
    }
}
