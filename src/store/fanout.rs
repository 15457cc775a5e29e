//! Fan-out outcome log — writes each outcome to every configured sink.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::OutcomeLogError;
use crate::pipeline::types::{OutcomeLog, OutcomeStatus, QueryRecord};

/// Writes to every sink; one failing sink does not stop the others.
///
/// With no sinks the outcome is only traced.
#[derive(Default)]
pub struct FanoutLog {
    sinks: Vec<Arc<dyn OutcomeLog>>,
}

impl FanoutLog {
    pub fn new(sinks: Vec<Arc<dyn OutcomeLog>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn OutcomeLog>) {
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl OutcomeLog for FanoutLog {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn record(
        &self,
        query: &QueryRecord,
        text: &str,
        status: OutcomeStatus,
    ) -> Result<(), OutcomeLogError> {
        info!(
            title = %query.title,
            publication = %query.publication,
            reply_to = ?query.reply_to,
            %status,
            "Outcome"
        );

        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(query, text, status).await {
                warn!(sink = sink.name(), error = %e, "Outcome sink failed");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
