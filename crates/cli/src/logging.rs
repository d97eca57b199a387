//! Tracing subscriber setup
//!
//! Logs always go to stdout. When `logging.file` is configured they are also
//! appended to that file through a non-blocking writer; the returned guard
//! must be held until exit so buffered lines are flushed.

use anyhow::{Context, Result};
use dropwatch_core::LoggingConfig;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level; `verbose` raises the default to
/// `debug`.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = build_env_filter(&config.level, verbose);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (dir, file_name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(&dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    if let Some(path) = &config.file {
        tracing::debug!("Logging to {}", path.display());
    }
    Ok(guard)
}

fn build_env_filter(level: &str, verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { level };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Split a log file path into its directory and file name
fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(file_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/dropwatch/service.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/dropwatch"));
        assert_eq!(name, PathBuf::from("service.log"));

        let (dir, name) = split_log_path(Path::new("service.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, PathBuf::from("service.log"));

        assert!(split_log_path(Path::new("/")).is_err());
    }
}
