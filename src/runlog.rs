//! Append-only run log: one entry per worker invocation.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::dispatch::Outcome;

/// Plain-text outcome log. Written for post-hoc diagnosis only; the relay
/// never reads it back.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Conventional location inside the relay's log directory.
    pub fn in_dir(log_dir: &Path) -> Self {
        Self::new(log_dir.join("worker-runs.log"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped entry for a finished invocation, including the
    /// captured output streams when non-empty.
    pub fn record(&self, job_name: &str, outcome: &Outcome) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "{stamp} ran worker for {job_name} -> rc={}", outcome.exit_code)?;
        if !outcome.stdout.is_empty() {
            writeln!(file, "stdout:\n{}", outcome.stdout.trim_end())?;
        }
        if !outcome.stderr.is_empty() {
            writeln!(file, "stderr:\n{}", outcome.stderr.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_entries_with_streams() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::in_dir(dir.path());

        log.record(
            "20260302_091500_000000001.json",
            &Outcome {
                exit_code: 0,
                stdout: "saved vendor 1000338436\n".into(),
                stderr: String::new(),
            },
        )
        .unwrap();
        log.record(
            "20260302_091501_000000002.json",
            &Outcome {
                exit_code: 3,
                stdout: String::new(),
                stderr: "element not found".into(),
            },
        )
        .unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("ran worker for 20260302_091500_000000001.json -> rc=0"));
        assert!(text.contains("stdout:\nsaved vendor 1000338436"));
        assert!(text.contains("ran worker for 20260302_091501_000000002.json -> rc=3"));
        assert!(text.contains("stderr:\nelement not found"));
    }
}
