//! Configuration module for the dropwatch pipeline
//!
//! Configuration is assembled from built-in defaults, an optional TOML file and
//! environment variables. Every section has usable defaults, so an empty file
//! (or no file at all) yields a runnable configuration.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::LOCAL_CONFIG_FILE;

use defaults::*;

/// Returns the path to the global configuration file
///
/// Stored at `~/.dropwatch/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".dropwatch").join("config.toml"))
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory watching and name matching
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Write-completion detection
    #[serde(default)]
    pub stability: StabilityConfig,

    /// Processing and retry policy
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Record persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Status HTTP API
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Watched directory and file naming convention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Directory to watch (non-recursive)
    #[serde(default = "default_watch_path")]
    pub watch_path: PathBuf,

    /// Regular expression a file name must match to be ingested
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Attempts to initialise the OS watcher before giving up
    #[serde(default = "default_init_retries")]
    pub init_retries: u32,

    /// Delay between watcher initialisation attempts
    #[serde(default = "default_init_retry_delay_ms")]
    pub init_retry_delay_ms: u64,
}

impl WatcherConfig {
    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(self.init_retry_delay_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            watch_path: default_watch_path(),
            file_pattern: default_file_pattern(),
            init_retries: default_init_retries(),
            init_retry_delay_ms: default_init_retry_delay_ms(),
        }
    }
}

/// Size-polling parameters of the stability detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Delay between two size polls
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Maximum number of polls per check (at least 2)
    #[serde(default = "default_max_checks")]
    pub max_checks: u32,

    /// Upper bound on stability checks running at the same time
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
}

impl StabilityConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            max_checks: default_max_checks(),
            max_concurrent_checks: default_max_concurrent_checks(),
        }
    }
}

/// Retry worker and file processor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Attempts per task before it is abandoned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before attempt `i + 1` is `retry_delays_ms[i - 1]`; the last value
    /// is reused when there are more attempts than delays
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,

    /// Encodings tried in order when decoding a file
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,

    /// JSON-lines file receiving abandoned tasks (disabled when unset)
    #[serde(default)]
    pub dead_letter_path: Option<PathBuf>,
}

impl WorkerConfig {
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delays_ms: default_retry_delays_ms(),
            encodings: default_encodings(),
            dead_letter_path: None,
        }
    }
}

/// SQLite record store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite database file (created when missing)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Connection pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl StorageConfig {
    /// sqlx connection URL for the configured database file
    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path.display())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Status API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Number of records returned by `/files` when no limit is given
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// CORS origins; empty disables CORS, `"*"` allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            host: default_server_host(),
            port: default_server_port(),
            recent_limit: default_recent_limit(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file written in addition to stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Check values that would otherwise break the pipeline at runtime
    pub fn validate(&self) -> Result<()> {
        if self.watcher.file_pattern.trim().is_empty() {
            return Err(Error::config("watcher.file_pattern must not be empty"));
        }

        if self.stability.max_checks < 2 {
            return Err(Error::config(format!(
                "stability.max_checks must be at least 2 (got {}): stability needs two consecutive polls",
                self.stability.max_checks
            )));
        }

        if self.stability.check_interval_ms == 0 {
            return Err(Error::config(
                "stability.check_interval_ms must be greater than 0",
            ));
        }

        if self.stability.max_concurrent_checks == 0 {
            return Err(Error::config(
                "stability.max_concurrent_checks must be greater than 0",
            ));
        }

        if self.worker.max_attempts == 0 {
            return Err(Error::config("worker.max_attempts must be greater than 0"));
        }

        if self.worker.encodings.is_empty() {
            return Err(Error::config("worker.encodings must list at least one encoding"));
        }

        if self.storage.max_connections == 0 {
            return Err(Error::config(
                "storage.max_connections must be greater than 0",
            ));
        }

        if self.server.recent_limit == 0 {
            return Err(Error::config("server.recent_limit must be greater than 0"));
        }

        Ok(())
    }
}
