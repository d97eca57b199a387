#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Directory watching for the ingestion pipeline
//!
//! This crate turns filesystem events into queued tasks:
//! - Name filtering against the ingestion convention
//! - Write-completion detection by size polling
//! - Concurrent, per-path ordered stability checks
//!
//! # Example
//!
//! ```no_run
//! use dropwatch_core::{Config, TaskQueue};
//! use dropwatch_watcher::DirectoryWatcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let queue = TaskQueue::new();
//! let mut watcher = DirectoryWatcher::new(config.watcher, config.stability)?;
//!
//! watcher.start(queue.clone()).await?;
//! while let Some(task) = queue.get().await {
//!     println!("Ready: {}", task.path().display());
//!     queue.task_done()?;
//! }
//! # Ok(())
//! # }
//! ```

mod events;
mod matcher;
mod stability;
mod watcher;

pub use events::{candidates, Candidate, CandidateKind};
pub use matcher::FileMatcher;
pub use stability::{FileProbe, FsProbe, Stability, StabilityDetector};
pub use watcher::DirectoryWatcher;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::stability::StabilityDetector;
    pub use crate::watcher::DirectoryWatcher;
}
