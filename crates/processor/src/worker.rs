//! Single consumer of the task queue
//!
//! Each task goes through `Dequeued -> Attempting(n) -> {Persisted, Abandoned}`.
//! Only persistence failures are retried; every retry re-reads the file.

use crate::dead_letter::{DeadLetter, DeadLetterLog};
use crate::file_processor::FileProcessor;
use crate::retry::RetryPolicy;
use chrono::Utc;
use dropwatch_core::error::Result;
use dropwatch_core::{FileStatus, FileTask, TaskQueue, WorkerConfig};
use dropwatch_storage::RecordStore;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Terminal state of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Exactly one record was stored
    Persisted { attempts: u32, status: FileStatus },
    /// Every attempt failed to persist; nothing was stored
    Abandoned { attempts: u32, last_error: String },
}

impl TaskOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Persisted { attempts, .. } | Self::Abandoned { attempts, .. } => *attempts,
        }
    }
}

/// Processes queued files one at a time and persists their records
pub struct RetryWorker {
    queue: TaskQueue,
    store: Arc<dyn RecordStore>,
    processor: FileProcessor,
    policy: RetryPolicy,
    dead_letters: Option<DeadLetterLog>,
}

impl RetryWorker {
    pub fn new(
        queue: TaskQueue,
        store: Arc<dyn RecordStore>,
        processor: FileProcessor,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            store,
            processor,
            policy,
            dead_letters: None,
        }
    }

    /// Worker wired from configuration; fails on unknown encodings
    pub fn from_config(
        config: &WorkerConfig,
        queue: TaskQueue,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        let worker = Self::new(
            queue,
            store,
            FileProcessor::new(config)?,
            RetryPolicy::from_config(config),
        );
        Ok(match &config.dead_letter_path {
            Some(path) => worker.with_dead_letter_log(DeadLetterLog::new(path)),
            None => worker,
        })
    }

    pub fn with_dead_letter_log(mut self, log: DeadLetterLog) -> Self {
        self.dead_letters = Some(log);
        self
    }

    /// Consume the queue until it is closed and drained, or `shutdown` fires
    ///
    /// Cancellation is only observed between tasks, so a task that has started
    /// always reaches a terminal state.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("File worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(pending = self.queue.size(), "File worker cancelled");
                    break;
                }
                task = self.queue.get() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            info!(path = %task.path().display(), "Processing file");

            let handled = AssertUnwindSafe(self.handle_task(&task))
                .catch_unwind()
                .await;
            if let Err(panic) = handled {
                error!(
                    path = %task.path().display(),
                    "Worker error: {}",
                    panic_message(panic.as_ref())
                );
            }

            if let Err(e) = self.queue.task_done() {
                error!("Worker error: {e}");
            }
        }

        info!("File worker stopped");
    }

    /// Run the attempt loop for one task
    pub async fn handle_task(&self, task: &FileTask) -> TaskOutcome {
        let path = task.path();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let record = self.processor.process(path).await;

            let err = match self.store.save(&record).await {
                Ok(()) => {
                    info!(
                        path = %path.display(),
                        status = %record.status,
                        lines = record.lines,
                        attempt,
                        "File processed"
                    );
                    return TaskOutcome::Persisted {
                        attempts: attempt,
                        status: record.status,
                    };
                }
                Err(e) => e,
            };

            match self.policy.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        path = %path.display(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Failed to save record, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(
                        path = %path.display(),
                        attempts = attempt,
                        error = %err,
                        "Giving up on file after {} attempts",
                        attempt
                    );
                    let last_error = err.to_string();
                    self.write_dead_letter(task, attempt, &last_error).await;
                    return TaskOutcome::Abandoned {
                        attempts: attempt,
                        last_error,
                    };
                }
            }
        }
    }

    async fn write_dead_letter(&self, task: &FileTask, attempts: u32, last_error: &str) {
        let Some(log) = &self.dead_letters else {
            return;
        };

        let entry = DeadLetter {
            path: task.path_string(),
            attempts,
            last_error: last_error.to_string(),
            abandoned_at: Utc::now(),
        };
        match log.append(&entry).await {
            Ok(()) => info!(
                path = %task.path().display(),
                log = %log.path().display(),
                "Abandoned file written to dead-letter log"
            ),
            Err(e) => error!(
                path = %task.path().display(),
                "Failed to write dead-letter entry: {e}"
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
