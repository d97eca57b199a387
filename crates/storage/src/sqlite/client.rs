use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dropwatch_core::{Error, FileRecord, FileStatus, Result, StorageConfig, StoredRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::RecordStore;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Record store backed by a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: i64,
    path: String,
    status: String,
    lines: Option<i64>,
    error: Option<String>,
    created_at: String,
    processed_at: Option<String>,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database at `config.database_path`
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::with_context(
                        format!("Failed to create database directory {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                StorageError::ConnectionFailed(format!(
                    "{}: {e}",
                    config.database_path.display()
                ))
            })?;

        Ok(Self { pool })
    }

    /// Private in-memory database, schema included
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("in-memory database: {e}")))?;

        let store = Self { pool };
        store.initialize_tables().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the `files` table and its indexes if they don't exist
    pub async fn initialize_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('OK', 'FAILED')),
                lines INTEGER,
                error TEXT,
                created_at TEXT NOT NULL,
                processed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("files table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_created_at ON files (created_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(format!("created_at index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_status ON files (status)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(format!("status index: {e}")))?;

        debug!("SQLite schema initialized");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn save(&self, record: &FileRecord) -> Result<()> {
        let lines = record
            .lines
            .map(i64::try_from)
            .transpose()
            .map_err(|_| Error::invalid_input(format!("Line count too large for {}", record.path)))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Transaction(format!("begin: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO files (path, status, lines, error, created_at, processed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.path)
        .bind(record.status.as_str())
        .bind(lines)
        .bind(record.error.as_deref())
        .bind(format_timestamp(&record.created_at))
        .bind(record.processed_at.as_ref().map(format_timestamp))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query(format!("insert record for {}: {e}", record.path)))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Transaction(format!("commit: {e}")))?;

        debug!(path = %record.path, status = %record.status, "Record saved");
        Ok(())
    }

    async fn count(&self, status: Option<FileStatus>) -> Result<u64> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| StorageError::Query(format!("count records: {e}")))?;

        Ok(count.max(0) as u64)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows: Vec<FileRow> = sqlx::query_as(
            r#"
            SELECT id, path, status, lines, error, created_at, processed_at
            FROM files
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("list recent records: {e}")))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let stored = row.into_stored()?;
            if !stored.record.is_consistent() {
                warn!(id = stored.id, path = %stored.record.path, "Stored record has inconsistent fields");
            }
            records.push(stored);
        }
        Ok(records)
    }

    async fn health_check(&self) -> Result<()> {
        let one: i64 = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("health check: {e}")))?;

        if one != 1 {
            return Err(StorageError::BackendError(format!(
                "health check returned {one}"
            ))
            .into());
        }
        Ok(())
    }
}

impl FileRow {
    fn into_stored(self) -> Result<StoredRecord> {
        let id = self.id;
        let invalid = |reason: String| Error::from(StorageError::InvalidRow { id, reason });

        let status = self
            .status
            .parse::<FileStatus>()
            .map_err(|e| invalid(e.to_string()))?;
        let lines = self
            .lines
            .map(u64::try_from)
            .transpose()
            .map_err(|_| invalid("negative line count".to_string()))?;
        let created_at = parse_timestamp(&self.created_at).map_err(invalid)?;
        let processed_at = self
            .processed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(invalid)?;

        Ok(StoredRecord {
            id,
            record: FileRecord {
                path: self.path,
                status,
                lines,
                error: self.error,
                created_at,
                processed_at,
            },
        })
    }
}

/// Fixed-width UTC form so that text ordering equals time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format_sorts_lexicographically() {
        let early = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.123456Z")
            .unwrap()
            .with_timezone(&Utc);

        let (a, b) = (format_timestamp(&late), format_timestamp(&early));
        assert_eq!(a, "2024-05-01T10:00:00.123456Z");
        assert!(a < b);
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_invalid_status_row_rejected() {
        let row = FileRow {
            id: 7,
            path: "/in/test_7.txt".to_string(),
            status: "MAYBE".to_string(),
            lines: None,
            error: None,
            created_at: "2024-05-01T10:00:00.000000Z".to_string(),
            processed_at: None,
        };
        assert!(row.into_stored().is_err());
    }
}
