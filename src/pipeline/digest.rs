//! Digest filter: extraction plus relevance filtering.
//!
//! The only entry point callers need: hand it a digest body, get back the
//! query records worth answering, in digest order.

use std::sync::LazyLock;

use tracing::debug;

use crate::pipeline::classifier::KeywordClassifier;
use crate::pipeline::extractor::extract_queries;
use crate::pipeline::keywords::KeywordTables;
use crate::pipeline::types::QueryRecord;

static DEFAULT_FILTER: LazyLock<DigestFilter> = LazyLock::new(DigestFilter::default);

/// Parse a digest body with the built-in keyword tables.
pub fn parse_digest(body: &str) -> Vec<QueryRecord> {
    DEFAULT_FILTER.parse(body)
}

/// Extracts query records and keeps the relevant ones.
///
/// Holds no mutable state, so one instance can serve any number of
/// concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct DigestFilter {
    classifier: KeywordClassifier,
}

impl DigestFilter {
    /// Create a filter around an existing classifier.
    pub fn new(classifier: KeywordClassifier) -> Self {
        Self { classifier }
    }

    /// Create a filter from keyword tables.
    pub fn with_tables(tables: KeywordTables) -> Self {
        Self::new(KeywordClassifier::new(tables))
    }

    /// The classifier used for relevance decisions.
    pub fn classifier(&self) -> &KeywordClassifier {
        &self.classifier
    }

    /// Extract all query blocks from `body` and keep those whose query text
    /// is relevant, preserving order.
    pub fn parse(&self, body: &str) -> Vec<QueryRecord> {
        let all = extract_queries(body);
        let total = all.len();

        let relevant: Vec<QueryRecord> = all
            .into_iter()
            .filter(|q| self.classifier.is_relevant(q.query_text.as_str()))
            .collect();

        debug!(total, relevant = relevant.len(), "Parsed digest");
        relevant
    }
}
