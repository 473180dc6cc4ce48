//! Archiver: finalizes a job once its worker invocation completes.
//!
//! Success archives the job file (byte copy under `success/`, then delete
//! from the queue). Failure leaves the file in the queue untouched so an
//! operator can re-process it; there is no automatic retry.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::dispatch::{JobFinalizer, Outcome};
use crate::error::ArchiveError;
use crate::runlog::RunLog;

/// Subdirectory of the archive root receiving successful jobs.
pub const SUCCESS_SUBDIR: &str = "success";

pub struct Archiver {
    archive_dir: PathBuf,
    run_log: RunLog,
}

impl Archiver {
    pub fn new(archive_dir: PathBuf, run_log: RunLog) -> Self {
        Self {
            archive_dir,
            run_log,
        }
    }

    /// Copy the job file into `success/` and remove the queued original.
    ///
    /// The archive directory is created if absent. A failed delete is logged
    /// and tolerated; the archived copy already exists at that point.
    async fn archive(&self, job_path: &Path) -> Result<PathBuf, ArchiveError> {
        let dest_dir = self.archive_dir.join(SUCCESS_SUBDIR);
        fs::create_dir_all(&dest_dir).await?;

        let name = job_path.file_name().unwrap_or_default();
        let dest = dest_dir.join(name);
        fs::copy(job_path, &dest).await?;

        if let Err(e) = fs::remove_file(job_path).await {
            tracing::warn!(
                job = %job_path.display(),
                error = %e,
                "Archived copy written but queue file could not be removed"
            );
        }

        Ok(dest)
    }
}

#[async_trait]
impl JobFinalizer for Archiver {
    async fn finalize(&self, job_path: &Path, outcome: &Outcome) {
        let job_name = job_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job_path.display().to_string());

        if let Err(e) = self.run_log.record(&job_name, outcome) {
            tracing::warn!(job = %job_name, error = %e, "Failed to append run log entry");
        }

        if outcome.success() {
            match self.archive(job_path).await {
                Ok(dest) => {
                    tracing::info!(job = %job_name, archived = %dest.display(), "Job archived");
                }
                Err(e) => {
                    tracing::error!(job = %job_name, error = %e, "Failed to archive job");
                }
            }
        } else {
            tracing::warn!(
                job = %job_name,
                exit_code = outcome.exit_code,
                log = %self.run_log.path().display(),
                "Worker failed; job left in queue for manual retry"
            );
        }
    }
}
