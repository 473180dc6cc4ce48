//! IMAP mailbox source: polls for unseen messages over TLS.
//!
//! Speaks just enough IMAP to LOGIN, SELECT, SEARCH UNSEEN, FETCH and mark
//! `\Seen`. Fetched messages are parsed with `mail_parser` and reduced to
//! [`MailEvent`] records; the raw body text is preserved verbatim because
//! the downstream worker re-parses it.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mail_parser::MessageParser;
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::MailConfig;
use crate::error::MailError;
use crate::mail::{MailEvent, MailSource};

/// IMAP-over-TLS polling source.
pub struct ImapSource {
    config: MailConfig,
}

impl ImapSource {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSource for ImapSource {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch_new(&self) -> Result<Vec<MailEvent>, MailError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unseen(&config))
            .await
            .map_err(|e| MailError::TaskFailed(e.to_string()))?
    }
}

// ── Blocking IMAP session ───────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// A tagged-command IMAP session over TLS.
struct ImapSession {
    stream: TlsStream,
    tag_seq: u32,
}

impl ImapSession {
    fn connect(config: &MailConfig) -> Result<Self, MailError> {
        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port)).map_err(|e| {
            MailError::Connect {
                host: config.imap_host.clone(),
                port: config.imap_port,
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(config.imap_host.clone())
                .map_err(|e| MailError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailError::Tls(e.to_string()))?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            tag_seq: 0,
        };
        // Server greeting arrives unprompted.
        session.read_line()?;
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(MailError::Protocol("connection closed".into())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send one tagged command and collect every response line up to and
    /// including the tagged completion line.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, MailError> {
        self.tag_seq += 1;
        let tag = format!("R{}", self.tag_seq);
        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }
}

/// One blocking poll cycle: login, search unseen, fetch each, mark seen.
fn fetch_unseen(config: &MailConfig) -> Result<Vec<MailEvent>, MailError> {
    let mut session = ImapSession::connect(config)?;

    let login = session.command(&format!(
        "LOGIN \"{}\" \"{}\"",
        config.username,
        config.password.expose_secret()
    ))?;
    if !login.last().is_some_and(|l| l.contains("OK")) {
        return Err(MailError::LoginFailed {
            username: config.username.clone(),
        });
    }

    session.command(&format!("SELECT \"{}\"", config.mailbox))?;

    let search = session.command("SEARCH UNSEEN")?;
    let mut ids: Vec<String> = Vec::new();
    for line in &search {
        if let Some(rest) = line.strip_prefix("* SEARCH") {
            ids.extend(rest.split_whitespace().map(str::to_string));
        }
    }

    let mut events = Vec::new();
    for id in &ids {
        let fetch = session.command(&format!("FETCH {id} RFC822"))?;
        // First and last lines are the untagged size header and the tagged
        // completion; everything between is the raw message.
        let raw: String = fetch
            .iter()
            .skip(1)
            .take(fetch.len().saturating_sub(2))
            .cloned()
            .collect();

        match extract_event(raw.as_bytes()) {
            Some(event) => events.push(event),
            None => tracing::warn!(id = %id, "Skipping unparseable message"),
        }

        let _ = session.command(&format!("STORE {id} +FLAGS (\\Seen)"));
    }

    let _ = session.command("LOGOUT");
    Ok(events)
}

// ── Message extraction ──────────────────────────────────────────────

/// Reduce a raw RFC822 message to a [`MailEvent`].
fn extract_event(raw: &[u8]) -> Option<MailEvent> {
    let parsed = MessageParser::default().parse(raw)?;

    let subject = parsed.subject().unwrap_or("(no subject)").to_string();

    let sender_address = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into());

    let body = if let Some(text) = parsed.body_text(0) {
        text.to_string()
    } else if let Some(html) = parsed.body_html(0) {
        strip_html(html.as_ref())
    } else {
        String::new()
    };

    let entry_id = parsed
        .message_id()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

    let received_utc = parsed
        .date()
        .and_then(format_received)
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());

    Some(MailEvent {
        subject,
        sender_address,
        received_utc,
        body,
        entry_id,
    })
}

/// Format a parsed message date as `Z`-suffixed ISO-8601.
fn format_received(d: &mail_parser::DateTime) -> Option<String> {
    let date = chrono::NaiveDate::from_ymd_opt(
        i32::from(d.year),
        u32::from(d.month),
        u32::from(d.day),
    )?;
    let naive = date.and_hms_opt(
        u32::from(d.hour),
        u32::from(d.minute),
        u32::from(d.second),
    )?;
    Some(naive.and_utc().format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Strip HTML tags and collapse whitespace (fallback for HTML-only mail).
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_tags() {
        assert_eq!(strip_html("<p>Vendor <b>1000338436</b></p>"), "Vendor 1000338436");
    }

    #[test]
    fn strip_html_normalizes_whitespace() {
        assert_eq!(strip_html("<div>  a \n b  </div>"), "a b");
    }

    #[test]
    fn strip_html_plain_passthrough() {
        assert_eq!(strip_html("no markup"), "no markup");
    }

    #[test]
    fn extract_event_reads_headers_and_body() {
        let raw = b"From: Accounts <accounts@example.com>\r\n\
            To: relay@example.com\r\n\
            Subject: VENDOR EMAIL - batch 12\r\n\
            Message-ID: <abc123@example.com>\r\n\
            Date: Mon, 2 Mar 2026 08:15:00 +0000\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            company_code SG80\r\n";

        let event = extract_event(raw).unwrap();
        assert_eq!(event.subject, "VENDOR EMAIL - batch 12");
        assert_eq!(event.sender_address, "accounts@example.com");
        assert_eq!(event.entry_id, "<abc123@example.com>");
        assert_eq!(event.received_utc, "2026-03-02T08:15:00Z");
        assert!(event.body.contains("company_code SG80"));
    }

    #[test]
    fn extract_event_generates_entry_id_when_missing() {
        let raw = b"From: a@b.c\r\nSubject: x\r\n\r\nbody\r\n";
        let event = extract_event(raw).unwrap();
        assert!(event.entry_id.starts_with("gen-"));
    }
}
