//! Mailbox channels: where digests come from and where replies go.

pub mod email;

pub use email::{EmailConfig, ImapMailbox};
