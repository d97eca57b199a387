#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Persistence for processing outcomes
//!
//! The worker only ever calls [`RecordStore::save`]; the status API reads
//! through [`RecordStore::count`] and [`RecordStore::list_recent`]. Each save
//! is its own transaction: it either durably stores the record or returns an
//! error with nothing written.

pub mod error;
mod factory;
pub mod mock;
pub mod sqlite;

pub use error::StorageError;
pub use factory::create_record_store;
pub use mock::MockRecordStore;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;
use dropwatch_core::{Error, FileRecord, FileStatus, StoredRecord};
use serde::{Deserialize, Serialize};

/// Record persistence consumed by the retry worker and the status API
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record atomically
    async fn save(&self, record: &FileRecord) -> Result<(), Error>;

    /// Number of stored records, optionally restricted to one status
    async fn count(&self, status: Option<FileStatus>) -> Result<u64, Error>;

    /// Most recent records, newest `created_at` first
    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredRecord>, Error>;

    /// Cheap round trip proving the backend answers
    async fn health_check(&self) -> Result<(), Error>;

    /// Totals per status
    async fn counts(&self) -> Result<RecordCounts, Error> {
        Ok(RecordCounts {
            total: self.count(None).await?,
            ok: self.count(Some(FileStatus::Ok)).await?,
            failed: self.count(Some(FileStatus::Failed)).await?,
        })
    }
}

/// Record totals as reported by `/stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub total: u64,
    pub ok: u64,
    pub failed: u64,
}
