//! In-memory record store for testing
//!
//! Failures can be scripted so worker retry behaviour is observable without
//! a real database.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use async_trait::async_trait;
use dropwatch_core::{Error, FileRecord, FileStatus, StoredRecord};
use std::sync::{Arc, Mutex};

use crate::RecordStore;

#[derive(Debug, Default)]
struct MockData {
    records: Vec<StoredRecord>,
    next_id: i64,
    save_attempts: usize,
    fail_next: usize,
    fail_always: bool,
    unhealthy: bool,
}

/// Mock record store keeping everything in a `Vec`
#[derive(Debug, Clone, Default)]
pub struct MockRecordStore {
    data: Arc<Mutex<MockData>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose next `n` saves fail
    pub fn failing_next(n: usize) -> Self {
        let store = Self::new();
        store.set_fail_next(n);
        store
    }

    /// Store whose saves always fail
    pub fn always_failing() -> Self {
        let store = Self::new();
        store.set_fail_always(true);
        store
    }

    pub fn set_fail_next(&self, n: usize) {
        self.data.lock().unwrap().fail_next = n;
    }

    pub fn set_fail_always(&self, fail: bool) {
        self.data.lock().unwrap().fail_always = fail;
    }

    /// Make `health_check` (and reads) fail
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.data.lock().unwrap().unhealthy = unhealthy;
    }

    /// Number of `save` calls, successful or not
    pub fn save_attempts(&self) -> usize {
        self.data.lock().unwrap().save_attempts
    }

    /// Snapshot of the persisted records in insertion order
    pub fn records(&self) -> Vec<FileRecord> {
        self.data
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|stored| stored.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn save(&self, record: &FileRecord) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.save_attempts += 1;

        if data.fail_always {
            return Err(Error::storage("simulated persistence failure"));
        }
        if data.fail_next > 0 {
            data.fail_next -= 1;
            return Err(Error::storage("simulated persistence failure"));
        }

        data.next_id += 1;
        let id = data.next_id;
        data.records.push(StoredRecord {
            id,
            record: record.clone(),
        });
        Ok(())
    }

    async fn count(&self, status: Option<FileStatus>) -> Result<u64, Error> {
        let data = self.data.lock().unwrap();
        if data.unhealthy {
            return Err(Error::storage("simulated backend outage"));
        }
        let count = data
            .records
            .iter()
            .filter(|stored| status.map_or(true, |s| stored.record.status == s))
            .count();
        Ok(count as u64)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredRecord>, Error> {
        let data = self.data.lock().unwrap();
        if data.unhealthy {
            return Err(Error::storage("simulated backend outage"));
        }
        let mut records = data.records.clone();
        records.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.id.cmp(&a.id))
        });
        records.truncate(limit);
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), Error> {
        if self.data.lock().unwrap().unhealthy {
            return Err(Error::storage("simulated backend outage"));
        }
        Ok(())
    }
}
