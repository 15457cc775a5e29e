use std::io::Cursor;

use chrono::TimeZone;

use super::*;

/// In-memory IMAP peer: replays a scripted server transcript and records
/// what the client wrote.
struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    written: Vec<u8>,
}

impl ScriptedStream {
    fn new(server: &[u8]) -> Self {
        Self {
            input: Cursor::new(server.to_vec()),
            written: Vec::new(),
        }
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn written(session: &ImapSession<ScriptedStream>) -> String {
    String::from_utf8_lossy(&session.stream.written).into_owned()
}

const DIGEST: &str = "Message-ID: <digest-1@haro.example>\r\n\
Date: Mon, 2 Mar 2026 12:00:00 +0000\r\n\
Subject: [HARO] Morning edition\r\n\
From: queries@haro.example\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Summary: Need expert on energy billing\r\n\
Query: How can consumers reduce smart meter costs?\r\n";

// ── IMAP session ────────────────────────────────────────────────────

#[test]
fn search_collects_uids_and_quotes_filter() {
    let mut session = ImapSession::new(ScriptedStream::new(
        b"* SEARCH 12 15\r\nA1 OK SEARCH completed\r\n",
    ));
    let uids = session.search_unseen("HARO").unwrap();
    assert_eq!(uids, vec![12, 15]);
    assert_eq!(written(&session), "A1 UID SEARCH UNSEEN SUBJECT \"HARO\"\r\n");
}

#[test]
fn search_with_no_matches_is_empty() {
    let mut session = ImapSession::new(ScriptedStream::new(b"* SEARCH\r\nA1 OK done\r\n"));
    assert!(session.search_unseen("HARO").unwrap().is_empty());
}

#[test]
fn fetch_reads_literal_exactly() {
    let mut server = format!("* 1 FETCH (UID 12 BODY[] {{{}}}\r\n", DIGEST.len()).into_bytes();
    server.extend_from_slice(DIGEST.as_bytes());
    server.extend_from_slice(b")\r\nA1 OK FETCH completed\r\n");

    let mut session = ImapSession::new(ScriptedStream::new(&server));
    let raw = session.fetch_raw(12).unwrap().unwrap();
    assert_eq!(raw, DIGEST.as_bytes());
    assert_eq!(written(&session), "A1 UID FETCH 12 BODY.PEEK[]\r\n");
}

#[test]
fn tags_increment_per_command() {
    let mut session = ImapSession::new(ScriptedStream::new(
        b"A1 OK STORE completed\r\nA2 OK STORE completed\r\n",
    ));
    session.mark_seen(3).unwrap();
    session.mark_seen(4).unwrap();
    assert_eq!(
        written(&session),
        "A1 UID STORE 3 +FLAGS (\\Seen)\r\nA2 UID STORE 4 +FLAGS (\\Seen)\r\n"
    );
}

#[test]
fn rejected_login_is_login_error() {
    let mut session =
        ImapSession::new(ScriptedStream::new(b"A1 NO [AUTHENTICATIONFAILED] Invalid\r\n"));
    let err = session.login("user", "secret").unwrap_err();
    assert!(matches!(err, ImapError::Login(_)));

    let channel_err = err.into_channel_error(|reason| ChannelError::FetchFailed {
        name: "email".into(),
        reason,
    });
    assert!(matches!(channel_err, ChannelError::AuthFailed { .. }));
}

#[test]
fn failed_command_names_verb_only() {
    let mut session = ImapSession::new(ScriptedStream::new(b"A1 BAD unknown\r\n"));
    match session.command("UID STORE 1 +FLAGS (\\Seen)") {
        Err(ImapError::Command { command, status }) => {
            assert_eq!(command, "UID STORE");
            assert_eq!(status, "BAD unknown");
        }
        other => panic!("expected command error, got {other:?}"),
    }
}

#[test]
fn closed_connection_is_error() {
    let mut session = ImapSession::new(ScriptedStream::new(b"* SEARCH 1\r\n"));
    assert!(matches!(session.search_unseen("HARO"), Err(ImapError::Closed)));
}

#[test]
fn quote_escapes_specials() {
    assert_eq!(quote("HARO"), "\"HARO\"");
    assert_eq!(quote(r#"pa"ss\word"#), r#""pa\"ss\\word""#);
}

#[test]
fn literal_len_detects_marker() {
    assert_eq!(literal_len("* 1 FETCH (BODY[] {342}\r\n"), Some(342));
    assert_eq!(literal_len("* SEARCH 1 2\r\n"), None);
    assert_eq!(literal_len("* OK {abc}\r\n"), None);
}

// ── Message parsing ─────────────────────────────────────────────────

#[test]
fn parse_plain_digest() {
    let email = parse_digest_message("12", DIGEST.as_bytes()).unwrap();
    assert_eq!(email.id, "12");
    assert_eq!(email.thread_id, "digest-1@haro.example");
    assert_eq!(email.subject, "[HARO] Morning edition");
    assert!(email.body.contains("Summary: Need expert on energy billing"));
    assert_eq!(
        email.timestamp,
        Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap())
    );
}

#[test]
fn parse_respects_timezone_offset() {
    let raw = DIGEST.replace("+0000", "-0500");
    let email = parse_digest_message("1", raw.as_bytes()).unwrap();
    assert_eq!(
        email.timestamp,
        Some(Utc.with_ymd_and_hms(2026, 3, 2, 17, 0, 0).unwrap())
    );
}

#[test]
fn parse_without_date_or_message_id() {
    let raw = "Subject: HARO\r\nContent-Type: text/plain\r\n\r\nbody text\r\n";
    let email = parse_digest_message("7", raw.as_bytes()).unwrap();
    assert_eq!(email.timestamp, None);
    assert_eq!(email.thread_id, "uid-7");
    assert!(email.body.contains("body text"));
}

#[test]
fn parse_html_only_strips_tags() {
    let raw = "Subject: HARO\r\nContent-Type: text/html\r\n\r\n<p>Summary: <b>Solar</b> panels</p>\r\n";
    let email = parse_digest_message("1", raw.as_bytes()).unwrap();
    assert!(!email.body.contains("<p>"));
    assert!(email.body.contains("Summary:"));
    assert!(email.body.contains("Solar"));
}

// ── Reply formatting ────────────────────────────────────────────────

#[test]
fn reply_subject_adds_prefix_once() {
    assert_eq!(reply_subject("[HARO] Morning"), "Re: [HARO] Morning");
    assert_eq!(reply_subject("Re: [HARO] Morning"), "Re: [HARO] Morning");
    assert_eq!(reply_subject("RE: x"), "RE: x");
    assert_eq!(reply_subject(""), "Re: ");
}

#[test]
fn reply_subject_multibyte_start() {
    assert_eq!(reply_subject("é"), "Re: é");
}

#[test]
fn reply_body_has_greeting() {
    assert_eq!(format_reply_body("Pitch text"), "Hi,\n\nPitch text\n");
}

#[test]
fn build_reply_threads_message() {
    let message = build_reply(
        "me@example.com",
        "reply-1@example.com",
        "digest-1@haro.example",
        "[HARO] Morning",
        "Pitch text",
    )
    .unwrap();
    let formatted = String::from_utf8(message.formatted()).unwrap();
    assert!(formatted.contains("Subject: Re: [HARO] Morning"));
    assert!(formatted.contains("In-Reply-To: <digest-1@haro.example>"));
    assert!(formatted.contains("References: <digest-1@haro.example>"));
    assert!(formatted.contains("To: reply-1@example.com"));
    assert!(formatted.contains("Hi,"));
}

#[test]
fn build_reply_rejects_bad_destination() {
    let err = build_reply("me@example.com", "not an address", "t", "s", "b").unwrap_err();
    assert!(matches!(err, ChannelError::SendFailed { .. }));
}

#[test]
fn mark_read_rejects_non_uid_id() {
    assert!(matches!(
        parse_uid("abc"),
        Err(ChannelError::UpdateFailed { .. })
    ));
    assert_eq!(parse_uid("42").unwrap(), 42);
}

// ── HTML stripping ──────────────────────────────────────────────────

#[test]
fn strip_html_basic() {
    assert_eq!(strip_html("<p>Hello</p>"), "Hello");
}

#[test]
fn strip_html_with_attributes() {
    assert_eq!(strip_html(r#"<a href="https://example.com">Link</a>"#), "Link");
}

#[test]
fn strip_html_whitespace_normalized() {
    assert_eq!(strip_html("<p>  Hello   World  </p>"), "Hello World");
}

#[test]
fn strip_html_empty() {
    assert_eq!(strip_html(""), "");
}

// ── Mailbox ─────────────────────────────────────────────────────────

#[test]
fn mailbox_name() {
    let mailbox = ImapMailbox::new(EmailConfig {
        imap_host: "imap.test.com".into(),
        imap_port: 993,
        smtp_host: "smtp.test.com".into(),
        smtp_port: 587,
        username: "user".into(),
        password: SecretString::from("pass"),
        from_address: "user@test.com".into(),
    });
    assert_eq!(mailbox.name(), "email");
}
