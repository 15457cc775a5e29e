//! Outcome persistence: Google Sheets, libSQL and fan-out over both.

pub mod fanout;
pub mod libsql_backend;
pub mod migrations;
pub mod sheets;

pub use fanout::FanoutLog;
pub use libsql_backend::{LibSqlOutcomeLog, PitchLogEntry};
pub use sheets::{SheetsConfig, SheetsOutcomeLog};
