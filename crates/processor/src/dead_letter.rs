//! JSON-lines log of abandoned tasks

use chrono::{DateTime, Utc};
use dropwatch_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// One abandoned task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub path: String,
    pub attempts: u32,
    pub last_error: String,
    pub abandoned_at: DateTime<Utc>,
}

/// Append-only dead-letter file
#[derive(Debug, Clone)]
pub struct DeadLetterLog {
    path: PathBuf,
}

impl DeadLetterLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry` as a single line, creating the file if needed
    pub async fn append(&self, entry: &DeadLetter) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| Error::processing(format!("Failed to serialize dead letter: {e}")))?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                Error::with_context(
                    format!("Failed to open dead-letter log {}", self.path.display()),
                    e,
                )
            })?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every entry back (used by tooling and tests)
    pub async fn read_all(&self) -> Result<Vec<DeadLetter>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    Error::processing(format!("Corrupt dead-letter entry: {e}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_creates_and_accumulates() {
        let dir = TempDir::new().unwrap();
        let log = DeadLetterLog::new(dir.path().join("dead").join("letters.jsonl"));

        assert!(log.read_all().await.unwrap().is_empty());

        let first = DeadLetter {
            path: "/in/test_1.txt".to_string(),
            attempts: 3,
            last_error: "database is locked".to_string(),
            abandoned_at: Utc::now(),
        };
        let second = DeadLetter {
            path: "/in/test_2.txt".to_string(),
            ..first.clone()
        };
        log.append(&first).await.unwrap();
        log.append(&second).await.unwrap();

        let entries = log.read_all().await.unwrap();
        assert_eq!(entries, vec![first, second]);

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }
}
