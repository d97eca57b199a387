//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::defaults::LOCAL_CONFIG_FILE;
use super::{global_config_path, Config};

/// Unprefixed environment variables accepted for compatibility, mapped to config keys
const LEGACY_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("WATCH_PATH", "watcher.watch_path"),
    ("DATABASE_PATH", "storage.database_path"),
];

const ENV_PREFIX: &str = "DROPWATCH";

/// Keys whose environment values are comma-separated lists
const LIST_KEYS: &[&str] = &[
    "worker.retry_delays_ms",
    "worker.encodings",
    "server.allowed_origins",
];

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// A missing file is treated as empty. Environment variables are prefixed
    /// with `DROPWATCH_` and use double underscores for nested values, e.g.
    /// `DROPWATCH_STABILITY__CHECK_INTERVAL_MS=500`. List values are
    /// comma-separated: `DROPWATCH_WORKER__RETRY_DELAYS_MS=100,200`.
    /// `WATCH_PATH` and `DATABASE_PATH` are honoured as well.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = ConfigLib::builder();

        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // List keys are split here so a single value such as `500` still
        // becomes a one-element list instead of a bare integer
        for key in LIST_KEYS {
            let var = list_env_var(key);
            if let Ok(value) = std::env::var(&var) {
                builder = builder
                    .set_override(*key, split_list(&value))
                    .map_err(|e| Error::config(format!("Failed to set {var}: {e}")))?;
            }
        }

        for (var, key) in LEGACY_ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                builder = builder
                    .set_override(*key, value)
                    .map_err(|e| Error::config(format!("Failed to set {var}: {e}")))?;
            }
        }

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load and validate the effective configuration
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (`--config` path, else `./dropwatch.toml`, else `~/.dropwatch/config.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => default_config_path()?,
        };

        let config = Self::from_file(&path)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_config_path() -> Result<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }
    global_config_path()
}

/// Environment variable carrying `key`, e.g. `DROPWATCH_WORKER__ENCODINGS`
fn list_env_var(key: &str) -> String {
    format!("{ENV_PREFIX}_{}", key.replace('.', "__").to_uppercase())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
