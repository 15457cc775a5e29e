//! Email mailbox — IMAP for digest retrieval, SMTP via lettre for replies.
//!
//! IMAP is spoken directly over rustls. Every operation opens its own
//! short-lived session on a blocking thread.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::transport::smtp::authentication::Credentials;
use lettre::message::Mailbox;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::MessageParser;
use rustls_pki_types::{InvalidDnsNameError, ServerName};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::ChannelError;
use crate::pipeline::types::{DigestEmail, MailboxGateway};

const CHANNEL_NAME: &str = "email";

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_IMAP_HOST` is not set (mailbox disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("EMAIL_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("EMAIL_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let smtp_host =
            std::env::var("EMAIL_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("EMAIL_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("EMAIL_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

// ── IMAP session ────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum ImapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid server name: {0}")]
    ServerName(#[from] InvalidDnsNameError),

    #[error("login rejected: {0}")]
    Login(String),

    #[error("{command} failed: {status}")]
    Command { command: String, status: String },

    #[error("connection closed")]
    Closed,
}

impl ImapError {
    fn into_channel_error(self, fallback: impl FnOnce(String) -> ChannelError) -> ChannelError {
        match self {
            Self::Login(reason) => ChannelError::AuthFailed {
                name: CHANNEL_NAME.into(),
                reason,
            },
            other => fallback(other.to_string()),
        }
    }
}

/// Result of one tagged IMAP command.
#[derive(Debug, Default)]
struct ImapResponse {
    /// Untagged and continuation lines, CRLF included.
    lines: Vec<String>,
    /// Literal payloads (`{n}`) in the order they arrived.
    literals: Vec<Vec<u8>>,
}

/// Minimal IMAP4rev1 client over any byte stream.
struct ImapSession<S: Read + Write> {
    stream: S,
    next_tag: u32,
}

impl<S: Read + Write> ImapSession<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            next_tag: 1,
        }
    }

    fn read_line(&mut self) -> Result<String, ImapError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte)? {
                0 => return Err(ImapError::Closed),
                _ => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
            }
        }
    }

    /// Send a command and collect everything up to its tagged completion.
    fn command(&mut self, cmd: &str) -> Result<ImapResponse, ImapError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let done_prefix = format!("{tag} ");
        let mut response = ImapResponse::default();
        loop {
            let line = self.read_line()?;
            if let Some(status) = line.strip_prefix(&done_prefix) {
                let status = status.trim_end();
                if status.starts_with("OK") {
                    return Ok(response);
                }
                return Err(ImapError::Command {
                    command: command_verb(cmd),
                    status: status.to_string(),
                });
            }

            if let Some(len) = literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
            }
            response.lines.push(line);
        }
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), ImapError> {
        let cmd = format!("LOGIN {} {}", quote(username), quote(password));
        match self.command(&cmd) {
            Ok(_) => Ok(()),
            Err(ImapError::Command { status, .. }) => Err(ImapError::Login(status)),
            Err(e) => Err(e),
        }
    }

    /// UIDs of unseen messages whose subject contains `subject_filter`.
    fn search_unseen(&mut self, subject_filter: &str) -> Result<Vec<u32>, ImapError> {
        let response = self.command(&format!(
            "UID SEARCH UNSEEN SUBJECT {}",
            quote(subject_filter)
        ))?;
        Ok(parse_search(&response.lines))
    }

    /// Raw RFC 822 bytes of one message, without setting `\Seen`.
    fn fetch_raw(&mut self, uid: u32) -> Result<Option<Vec<u8>>, ImapError> {
        let mut response = self.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
        Ok(response.literals.drain(..).next())
    }

    fn mark_seen(&mut self, uid: u32) -> Result<(), ImapError> {
        self.command(&format!("UID STORE {uid} +FLAGS (\\Seen)"))?;
        Ok(())
    }

    fn logout(&mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!(error = %e, "IMAP logout did not complete cleanly");
        }
    }
}

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Connect, log in and select INBOX (blocking).
fn open_session(config: &EmailConfig) -> Result<ImapSession<TlsStream>, ImapError> {
    let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = ServerName::try_from(config.imap_host.clone())?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)?;

    let mut session = ImapSession::new(rustls::StreamOwned::new(conn, tcp));
    let _greeting = session.read_line()?;
    session.login(&config.username, config.password.expose_secret())?;
    session.command("SELECT \"INBOX\"")?;
    Ok(session)
}

fn fetch_unread_blocking(
    config: &EmailConfig,
    subject_filter: &str,
) -> Result<Vec<DigestEmail>, ImapError> {
    let mut session = open_session(config)?;
    let uids = session.search_unseen(subject_filter)?;
    debug!(count = uids.len(), "IMAP search returned unseen messages");

    let mut emails = Vec::with_capacity(uids.len());
    for uid in uids {
        match session.fetch_raw(uid)? {
            Some(raw) => match parse_digest_message(&uid.to_string(), &raw) {
                Some(email) => emails.push(email),
                None => debug!(uid, "Skipping unparseable message"),
            },
            None => debug!(uid, "FETCH returned no body"),
        }
    }

    session.logout();
    Ok(emails)
}

fn mark_seen_blocking(config: &EmailConfig, uid: u32) -> Result<(), ImapError> {
    let mut session = open_session(config)?;
    session.mark_seen(uid)?;
    session.logout();
    Ok(())
}

// ── SMTP ────────────────────────────────────────────────────────────

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: CHANNEL_NAME.into(),
        reason,
    }
}

/// Build the reply message for a digest thread.
fn build_reply(
    from: &str,
    to: &str,
    thread_id: &str,
    subject: &str,
    body: &str,
) -> Result<Message, ChannelError> {
    let from = from
        .parse::<Mailbox>()
        .map_err(|e| send_failed(format!("Invalid from address: {e}")))?;
    let to = to
        .parse::<Mailbox>()
        .map_err(|e| send_failed(format!("Invalid to address: {e}")))?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(reply_subject(subject));

    if !thread_id.is_empty() {
        let message_id = angle_bracketed(thread_id);
        builder = builder
            .in_reply_to(message_id.clone())
            .references(message_id);
    }

    builder
        .body(format_reply_body(body))
        .map_err(|e| send_failed(format!("Failed to build email: {e}")))
}

fn send_blocking(config: &EmailConfig, message: &Message) -> Result<(), ChannelError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    // 465 is implicit TLS; anything else upgrades with STARTTLS.
    let builder = if config.smtp_port == 465 {
        SmtpTransport::relay(&config.smtp_host)
    } else {
        SmtpTransport::starttls_relay(&config.smtp_host)
    }
    .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?;

    let transport = builder
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    transport
        .send(message)
        .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;
    Ok(())
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// IMAP/SMTP implementation of `MailboxGateway`.
pub struct ImapMailbox {
    config: Arc<EmailConfig>,
}

impl ImapMailbox {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

fn parse_uid(id: &str) -> Result<u32, ChannelError> {
    id.parse().map_err(|_| ChannelError::UpdateFailed {
        name: CHANNEL_NAME.into(),
        id: id.to_string(),
        reason: "message id is not an IMAP UID".into(),
    })
}

#[async_trait]
impl MailboxGateway for ImapMailbox {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn fetch_unread(&self, subject_filter: &str) -> Result<Vec<DigestEmail>, ChannelError> {
        let config = Arc::clone(&self.config);
        let filter = subject_filter.to_string();
        let fetch_failed = |reason: String| ChannelError::FetchFailed {
            name: CHANNEL_NAME.into(),
            reason,
        };

        let emails = tokio::task::spawn_blocking(move || fetch_unread_blocking(&config, &filter))
            .await
            .map_err(|e| fetch_failed(format!("IMAP task panicked: {e}")))?
            .map_err(|e| e.into_channel_error(fetch_failed))?;

        info!(count = emails.len(), host = %self.config.imap_host, "Fetched unread digests");
        Ok(emails)
    }

    async fn mark_read(&self, id: &str) -> Result<(), ChannelError> {
        let uid = parse_uid(id)?;
        let config = Arc::clone(&self.config);
        let update_failed = |reason: String| ChannelError::UpdateFailed {
            name: CHANNEL_NAME.into(),
            id: id.to_string(),
            reason,
        };

        tokio::task::spawn_blocking(move || mark_seen_blocking(&config, uid))
            .await
            .map_err(|e| update_failed(format!("IMAP task panicked: {e}")))?
            .map_err(|e| e.into_channel_error(update_failed))
    }

    async fn send_reply(
        &self,
        thread_id: &str,
        subject: &str,
        body: &str,
        destination: &str,
    ) -> Result<(), ChannelError> {
        let message = build_reply(
            &self.config.from_address,
            destination,
            thread_id,
            subject,
            body,
        )?;
        let config = Arc::clone(&self.config);

        tokio::task::spawn_blocking(move || send_blocking(&config, &message))
            .await
            .map_err(|e| send_failed(format!("SMTP task panicked: {e}")))??;

        info!(to = destination, "Reply sent");
        Ok(())
    }
}

// ── Helpers (public for testing) ────────────────────────────────────

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reply subject: `Re: ` prefix unless already a reply.
pub fn reply_subject(subject: &str) -> String {
    let already_reply = subject
        .get(..3)
        .is_some_and(|p| p.eq_ignore_ascii_case("re:"));
    if already_reply {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Wrap pitch text in the reply greeting.
pub fn format_reply_body(body: &str) -> String {
    format!("Hi,\n\n{body}\n")
}

fn angle_bracketed(id: &str) -> String {
    if id.starts_with('<') {
        id.to_string()
    } else {
        format!("<{id}>")
    }
}

/// Readable text of a parsed message: plain part, else stripped HTML, else empty.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.into_owned();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Turn raw RFC 822 bytes into a `DigestEmail`. `id` is the IMAP UID.
pub fn parse_digest_message(id: &str, raw: &[u8]) -> Option<DigestEmail> {
    let parsed = MessageParser::default().parse(raw)?;

    let thread_id = parsed
        .message_id()
        .map(str::to_string)
        .unwrap_or_else(|| format!("uid-{id}"));
    let timestamp = parsed
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0));

    Some(DigestEmail {
        id: id.to_string(),
        thread_id,
        subject: parsed.subject().unwrap_or_default().to_string(),
        body: extract_text(&parsed),
        timestamp,
    })
}

/// Quote an IMAP string argument.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn command_verb(cmd: &str) -> String {
    let mut words = cmd.split_whitespace();
    match words.next() {
        Some("UID") => format!("UID {}", words.next().unwrap_or_default()),
        Some(verb) => verb.to_string(),
        None => String::new(),
    }
}

/// Length of a trailing `{n}` literal marker, if any.
fn literal_len(line: &str) -> Option<usize> {
    let line = line.trim_end_matches("\r\n");
    let body = line.strip_suffix('}')?;
    let start = body.rfind('{')?;
    body[start + 1..].parse().ok()
}

fn parse_search(lines: &[String]) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().filter_map(|n| n.parse().ok()))
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "email_tests.rs"]
mod tests;
