//! Pipeline data model
//!
//! A [`FileTask`] is the queued reference to a file awaiting processing. A
//! [`FileRecord`] is the immutable outcome of one processing attempt, built by
//! the worker and handed to the persistence layer.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A unit of work: one stability-confirmed file waiting to be processed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileTask {
    path: PathBuf,
}

impl FileTask {
    /// Create a task for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the file to process
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lossy string form of the path, as stored in records
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Processing status stored with every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAILED")]
    Failed,
}

impl FileStatus {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OK" => Ok(Self::Ok),
            "FAILED" => Ok(Self::Failed),
            other => Err(Error::invalid_input(format!("Unknown file status '{other}'"))),
        }
    }
}

/// Outcome of processing one file
///
/// `lines` and `processed_at` are set iff the status is [`FileStatus::Ok`];
/// `error` is set iff the status is [`FileStatus::Failed`]. The constructors
/// are the only way the worker builds records, so the invariant holds for
/// everything that reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub status: FileStatus,
    pub lines: Option<u64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Successful record with a line count
    pub fn ok(
        path: impl Into<String>,
        lines: u64,
        created_at: DateTime<Utc>,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Ok,
            lines: Some(lines),
            error: None,
            created_at,
            processed_at: Some(processed_at),
        }
    }

    /// Failed record carrying the failure description
    pub fn failed(path: impl Into<String>, error: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Failed,
            lines: None,
            error: Some(error.into()),
            created_at,
            processed_at: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FileStatus::Ok
    }

    /// Check the status/field invariant
    ///
    /// Used by stores when loading rows that may have been written by other tools.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            FileStatus::Ok => {
                self.lines.is_some() && self.error.is_none() && self.processed_at.is_some()
            }
            FileStatus::Failed => {
                self.lines.is_none() && self.error.is_some() && self.processed_at.is_none()
            }
        }
    }
}

/// A record as read back from the store, with its store-assigned id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: FileRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ok_record_fields() {
        let now = Utc::now();
        let record = FileRecord::ok("/in/test_1.txt", 3, now, now);

        assert!(record.is_ok());
        assert!(record.is_consistent());
        assert_eq!(record.lines, Some(3));
        assert_eq!(record.error, None);
        assert_eq!(record.processed_at, Some(now));
    }

    #[test]
    fn test_failed_record_fields() {
        let record = FileRecord::failed("/in/test_2.txt", "no encoding matched", Utc::now());

        assert!(!record.is_ok());
        assert!(record.is_consistent());
        assert_eq!(record.lines, None);
        assert_eq!(record.processed_at, None);
    }

    #[test]
    fn test_inconsistent_record_detected() {
        let mut record = FileRecord::failed("/in/test_3.txt", "boom", Utc::now());
        record.lines = Some(1);
        assert!(!record.is_consistent());
    }

    #[test]
    fn test_status_round_trip_through_str() {
        assert_eq!("OK".parse::<FileStatus>().unwrap(), FileStatus::Ok);
        assert_eq!("FAILED".parse::<FileStatus>().unwrap(), FileStatus::Failed);
        assert!("ok".parse::<FileStatus>().is_err());
        assert_eq!(FileStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&FileStatus::Ok).unwrap();
        assert_eq!(json, "\"OK\"");
    }

    #[test]
    fn test_task_path_string() {
        let task = FileTask::new("/data/in/test_42.txt");
        assert_eq!(task.path_string(), "/data/in/test_42.txt");
        assert_eq!(task.path(), Path::new("/data/in/test_42.txt"));
    }
}
