//! Digest processing pipeline.
//!
//! Every digest email flows through:
//! 1. `extractor::extract_queries()`: split the body into query records
//! 2. `classifier::KeywordClassifier`: keyword relevance/exclusion (no LLM)
//! 3. `digest::DigestFilter`: the two above, composed
//! 4. `processor::DigestProcessor`: generate, send and log per query
//!
//! Steps 1–3 are pure and synchronous; only the processor does I/O.

pub mod classifier;
pub mod digest;
pub mod extractor;
pub mod keywords;
pub mod processor;
pub mod types;
pub mod window;

pub use classifier::KeywordClassifier;
pub use digest::{DigestFilter, parse_digest};
pub use extractor::extract_queries;
pub use keywords::KeywordTables;
pub use processor::{DigestProcessor, ProcessorConfig};
pub use types::{
    DigestEmail, MailboxGateway, OutcomeLog, OutcomeStatus, QueryRecord, ResponseGenerator,
    RunReport,
};
