//! Worker invocation: run the external automation process for one job.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::InvokeError;

/// Environment variable naming the job file's directory.
pub const JOB_DIR_ENV: &str = "RELAY_JOB_DIR";
/// Environment variable naming the job file within that directory.
pub const JOB_FILE_ENV: &str = "RELAY_JOB_FILE";
/// Cleared from the inherited environment so a worker never dry-runs a
/// queued job by accident.
const DRY_RUN_ENV: &str = "RELAY_DRY_RUN";

/// Result of one worker invocation.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Outcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Synthetic failure outcome for invocations that never produced an
    /// exit status (e.g. the command could not be started).
    pub fn invocation_failure(reason: &str) -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: reason.to_string(),
        }
    }
}

/// Pluggable worker mechanism.
///
/// The dispatcher and archiver only see this trait, so the worker can be a
/// subprocess, an in-process function, or anything else.
#[async_trait]
pub trait WorkerExecutor: Send + Sync {
    async fn run(&self, job_path: &Path) -> Result<Outcome, InvokeError>;
}

/// Executor that spawns a fixed external command per job.
///
/// The job is identified to the child through [`JOB_DIR_ENV`] and
/// [`JOB_FILE_ENV`]; success is signalled exclusively by exit code 0. There
/// is no timeout: a worker that hangs holds the single dispatch slot until
/// the relay process is restarted.
pub struct SubprocessExecutor {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl SubprocessExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    /// Set the working directory for the worker process.
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

#[async_trait]
impl WorkerExecutor for SubprocessExecutor {
    async fn run(&self, job_path: &Path) -> Result<Outcome, InvokeError> {
        let file_name = job_path
            .file_name()
            .ok_or_else(|| InvokeError::BadJobPath(job_path.to_path_buf()))?;
        let job_dir = job_path.parent().unwrap_or_else(|| Path::new("."));

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env_remove(DRY_RUN_ENV)
            .env(JOB_DIR_ENV, job_dir)
            .env(JOB_FILE_ENV, file_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| InvokeError::Spawn {
            command: self.program.clone(),
            reason: e.to_string(),
        })?;

        let output = child.wait_with_output().await?;

        Ok(Outcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
