//! Single-slot dispatcher: serializes worker invocations.

pub mod subprocess;

pub use subprocess::{JOB_DIR_ENV, JOB_FILE_ENV, Outcome, SubprocessExecutor, WorkerExecutor};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Finalizes a job once its invocation outcome is known.
#[async_trait]
pub trait JobFinalizer: Send + Sync {
    async fn finalize(&self, job_path: &Path, outcome: &Outcome);
}

/// Bounded single-worker task runner.
///
/// Exactly one invocation is in flight at any instant; submissions queue in
/// arrival order behind it (queue depth is unbounded). Construct one at the
/// composition root and pass it by reference to whatever needs to submit.
///
/// Executor errors are caught here, logged with the job identity, and
/// converted into a failure outcome; they never propagate, so one bad job
/// cannot take the process down.
pub struct Dispatcher {
    tx: Mutex<Option<mpsc::UnboundedSender<PathBuf>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start the dispatcher's single consumer task.
    pub fn spawn(executor: Arc<dyn WorkerExecutor>, finalizer: Arc<dyn JobFinalizer>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let worker = tokio::spawn(async move {
            while let Some(job_path) = rx.recv().await {
                let job_name = display_name(&job_path);
                tracing::info!(job = %job_name, "Starting automation worker");

                let outcome = match executor.run(&job_path).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(job = %job_name, error = %e, "Worker invocation failed");
                        Outcome::invocation_failure(&e.to_string())
                    }
                };

                tracing::info!(
                    job = %job_name,
                    exit_code = outcome.exit_code,
                    "Worker finished"
                );
                finalizer.finalize(&job_path, &outcome).await;
            }
            tracing::debug!("Dispatcher drained");
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue a job for processing. Never blocks.
    pub fn submit(&self, job_path: PathBuf) {
        let guard = self.tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(job_path).is_err() {
                    tracing::warn!("Dispatcher task is gone; job dropped");
                }
            }
            None => tracing::warn!("Dispatcher is shut down; job dropped"),
        }
    }

    /// Stop accepting submissions and wait for queued jobs to drain.
    pub async fn shutdown(&self) {
        let tx = self.tx.lock().unwrap().take();
        drop(tx);
        let worker = self.worker.lock().unwrap().take();
        if let Some(handle) = worker {
            let _ = handle.await;
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
