//! Error types for the vendor relay.

use std::path::PathBuf;

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Worker invocation error: {0}")]
    Invoke(#[from] InvokeError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mailbox polling errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("IMAP login failed for {username}")]
    LoginFailed { username: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("Poll task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Queue directory and payload writer errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to serialize job record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Worker invocation errors.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Failed to start worker command {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Job path {} has no filename component", .0.display())]
    BadJobPath(PathBuf),

    #[error("IO error while running worker: {0}")]
    Io(#[from] std::io::Error),
}

/// Archiver errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Worker-log report parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Log directory not found: {}", .0.display())]
    DirNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;
