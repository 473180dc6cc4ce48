//! Configuration, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Subject keyword phrases; a mail item is queued when its subject
    /// case-insensitively contains any of them.
    pub keywords: Vec<String>,
    /// Sender allowlist (`*` allows everyone, the default).
    pub allowed_senders: Vec<String>,
    /// Directory holding pending job files.
    pub queue_dir: PathBuf,
    /// Directory receiving the `success/` archive.
    pub archive_dir: PathBuf,
    /// Optional mirror location for freshly written job files.
    pub backup_dir: Option<PathBuf>,
    /// Directory for the relay's own log files.
    pub log_dir: PathBuf,
    /// Worker program to invoke per job.
    pub worker_program: String,
    /// Arguments passed to the worker program.
    pub worker_args: Vec<String>,
    /// Working directory for the worker process, if any.
    pub worker_dir: Option<PathBuf>,
}

impl Config {
    /// Build config from environment variables.
    ///
    /// `RELAY_WORKER_CMD` is required; it is split on whitespace into the
    /// program and its arguments (paths containing spaces are not supported).
    /// Everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cmdline = std::env::var("RELAY_WORKER_CMD")
            .map_err(|_| ConfigError::MissingEnvVar("RELAY_WORKER_CMD".into()))?;
        let mut parts = cmdline.split_whitespace().map(str::to_string);
        let worker_program = parts.next().ok_or_else(|| ConfigError::InvalidValue {
            key: "RELAY_WORKER_CMD".into(),
            message: "command line is empty".into(),
        })?;
        let worker_args: Vec<String> = parts.collect();

        let keywords = parse_csv("RELAY_KEYWORDS")
            .unwrap_or_else(|| vec!["vendor email".into(), "gl email".into()]);

        let allowed_senders =
            parse_csv("RELAY_ALLOWED_SENDERS").unwrap_or_else(|| vec!["*".into()]);

        Ok(Self {
            keywords,
            allowed_senders,
            queue_dir: path_var("RELAY_QUEUE_DIR", "./data/queue"),
            archive_dir: path_var("RELAY_ARCHIVE_DIR", "./data/archive"),
            backup_dir: std::env::var("RELAY_BACKUP_DIR").ok().map(PathBuf::from),
            log_dir: path_var("RELAY_LOG_DIR", "./data/logs"),
            worker_program,
            worker_args,
            worker_dir: std::env::var("RELAY_WORKER_DIR").ok().map(PathBuf::from),
        })
    }
}

/// Mailbox connection settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: SecretString,
    pub mailbox: String,
    pub poll_interval: Duration,
}

impl MailConfig {
    /// Build mail config from environment variables.
    /// Returns `None` if `RELAY_IMAP_HOST` is not set (listening disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("RELAY_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("RELAY_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let username = std::env::var("RELAY_IMAP_USERNAME").unwrap_or_default();
        let password =
            SecretString::from(std::env::var("RELAY_IMAP_PASSWORD").unwrap_or_default());

        let mailbox = std::env::var("RELAY_IMAP_MAILBOX").unwrap_or_else(|_| "INBOX".into());

        let poll_interval_secs: u64 = std::env::var("RELAY_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Some(Self {
            imap_host,
            imap_port,
            username,
            password,
            mailbox,
            poll_interval: Duration::from_secs(poll_interval_secs),
        })
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

/// Parse a comma-separated environment variable into a list.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    let raw = std::env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_csv_splits_and_trims() {
        // SAFETY: var name is unique to this test; no concurrent reader.
        unsafe { std::env::set_var("RELAY_TEST_CSV_A", "vendor email, gl email ,,") };
        let items = parse_csv("RELAY_TEST_CSV_A").unwrap();
        assert_eq!(items, vec!["vendor email".to_string(), "gl email".to_string()]);
        unsafe { std::env::remove_var("RELAY_TEST_CSV_A") };
    }

    #[test]
    fn parse_csv_missing_is_none() {
        assert!(parse_csv("RELAY_TEST_CSV_MISSING").is_none());
    }

    #[test]
    fn parse_csv_blank_is_none() {
        // SAFETY: var name is unique to this test; no concurrent reader.
        unsafe { std::env::set_var("RELAY_TEST_CSV_B", " , ") };
        assert!(parse_csv("RELAY_TEST_CSV_B").is_none());
        unsafe { std::env::remove_var("RELAY_TEST_CSV_B") };
    }

    #[test]
    fn config_requires_worker_cmd() {
        // SAFETY: test-local mutation; restored below.
        unsafe { std::env::remove_var("RELAY_WORKER_CMD") };
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn mail_config_absent_without_host() {
        // SAFETY: test-local mutation.
        unsafe { std::env::remove_var("RELAY_IMAP_HOST") };
        assert!(MailConfig::from_env().is_none());
    }
}
