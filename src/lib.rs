//! HARO Assist — answers journalist-query digests.
//!
//! A digest email is split into query blocks, filtered by topic keywords,
//! and each surviving query gets an LLM-drafted pitch sent to its own
//! reply-to address. Outcomes go to Google Sheets and/or libSQL.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod pitch;
pub mod store;
