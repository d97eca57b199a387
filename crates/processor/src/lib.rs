#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! File processing and the retry worker
//!
//! [`FileProcessor`] turns a path into a record and never fails;
//! [`RetryWorker`] drains the task queue and retries persistence with a
//! bounded [`RetryPolicy`].

pub mod dead_letter;
pub mod encoding;
pub mod file_processor;
pub mod retry;
pub mod worker;

use dropwatch_core::error::Result;
use dropwatch_core::{TaskQueue, WorkerConfig};
use dropwatch_storage::RecordStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Re-export for ease of use
pub use dead_letter::{DeadLetter, DeadLetterLog};
pub use encoding::{EncodingChain, TextEncoding};
pub use file_processor::{count_lines, FileProcessor, LineCount, ProcessError};
pub use retry::RetryPolicy;
pub use worker::{RetryWorker, TaskOutcome};

/// Start the worker as a background task
///
/// The returned handle completes once the queue is closed and drained, or
/// `shutdown` is cancelled between two tasks.
pub fn start_worker(
    config: &WorkerConfig,
    queue: TaskQueue,
    store: Arc<dyn RecordStore>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    let worker = RetryWorker::from_config(config, queue, store)?;
    Ok(tokio::spawn(async move { worker.run(shutdown).await }))
}
