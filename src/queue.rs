//! File-backed job queue: the durable mailbox between listener and worker.
//!
//! Each job is one JSON file in a flat directory. Filenames are
//! `YYYYMMDD_HHMMSS_<9-digit-fraction>.json`, so lexicographic order is
//! arrival order. A job file is written once and never mutated; only the
//! archiver moves or deletes it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;

use crate::dispatch::Dispatcher;
use crate::error::QueueError;
use crate::mail::{InboxObserver, MailEvent};

/// Queue directory plus the payload writer.
pub struct JobQueue {
    queue_dir: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl JobQueue {
    pub fn new(queue_dir: PathBuf, backup_dir: Option<PathBuf>) -> Self {
        Self {
            queue_dir,
            backup_dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.queue_dir
    }

    /// Write one record to a uniquely named file in the queue directory and
    /// return the path.
    ///
    /// The queue directory is created if absent. When a backup directory is
    /// configured the fresh file is mirrored there best-effort; a mirror
    /// failure never fails the deposit.
    pub async fn deposit(&self, record: &MailEvent) -> Result<PathBuf, QueueError> {
        fs::create_dir_all(&self.queue_dir).await?;

        let path = self.unique_path();
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json).await?;

        if let Some(backup_dir) = &self.backup_dir {
            if let Err(e) = mirror(&path, backup_dir).await {
                tracing::warn!(
                    backup = %backup_dir.display(),
                    error = %e,
                    "Backup mirror failed; job file is still queued"
                );
            }
        }

        Ok(path)
    }

    /// Sorted listing of queued job files, oldest first.
    ///
    /// For operator inspection and manual re-submission; the dispatcher only
    /// processes paths it is explicitly handed.
    pub async fn pending(&self) -> Result<Vec<PathBuf>, QueueError> {
        if !self.queue_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&self.queue_dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Derive a queue path that is guaranteed not to exist yet.
    ///
    /// Second-granularity wall-clock stamp plus the sub-second nanosecond
    /// fraction; collisions within the same nanosecond are resolved by
    /// probing forward.
    fn unique_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut frac = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        loop {
            let candidate = self.queue_dir.join(format!("{stamp}_{frac:09}.json"));
            if !candidate.exists() {
                return candidate;
            }
            frac = frac.wrapping_add(1) % 1_000_000_000;
        }
    }
}

async fn mirror(path: &Path, backup_dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(backup_dir).await?;
    let name = path.file_name().unwrap_or_default();
    fs::copy(path, backup_dir.join(name)).await?;
    Ok(())
}

/// Observer that deposits each matching item and submits it for processing.
pub struct QueueingObserver {
    queue: Arc<JobQueue>,
    dispatcher: Arc<Dispatcher>,
}

impl QueueingObserver {
    pub fn new(queue: Arc<JobQueue>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { queue, dispatcher }
    }
}

#[async_trait]
impl InboxObserver for QueueingObserver {
    async fn on_item_added(&self, event: MailEvent) {
        match self.queue.deposit(&event).await {
            Ok(path) => {
                tracing::info!(job = %path.display(), "Queued automation job");
                self.dispatcher.submit(path);
            }
            Err(e) => {
                tracing::error!(
                    entry_id = %event.entry_id,
                    error = %e,
                    "Failed to queue mail item"
                );
            }
        }
    }
}
