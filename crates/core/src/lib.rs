#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Core types for the dropwatch ingestion pipeline
//!
//! This crate provides the foundations shared by the watcher, the worker and
//! the status API:
//!
//! - **Records**: [`FileTask`] (queued work) and [`FileRecord`] (persisted outcome)
//! - **Queue**: the in-memory [`TaskQueue`] handing tasks from watcher to worker
//! - **Configuration**: file + environment driven [`Config`]
//! - **Error handling**: unified [`Error`] type

pub mod config;
pub mod error;
pub mod queue;
pub mod records;

// Re-export main types for convenience
pub use config::{
    Config, LoggingConfig, ServerConfig, StabilityConfig, StorageConfig, WatcherConfig,
    WorkerConfig,
};
pub use error::{Error, Result, ResultExt};
pub use queue::TaskQueue;
pub use records::{FileRecord, FileStatus, FileTask, StoredRecord};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
