//! Write-completion detection by size polling
//!
//! A file is considered fully written once two consecutive polls report the
//! same size. The first poll only establishes a baseline, so at least two
//! polls are always needed. A file that is rewritten to exactly the same size
//! between two polls is misclassified as stable; content is never hashed.

use async_trait::async_trait;
use dropwatch_core::StabilityConfig;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Source of file sizes for the detector
#[async_trait]
pub trait FileProbe: Send + Sync {
    /// Current size of the regular file at `path`
    ///
    /// `Ok(None)` means the path no longer exists or is not a regular file.
    async fn size(&self, path: &Path) -> io::Result<Option<u64>>;
}

/// Probe backed by filesystem metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

#[async_trait]
impl FileProbe for FsProbe {
    async fn size(&self, path: &Path) -> io::Result<Option<u64>> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Verdict of one stability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stability {
    /// Two consecutive polls agreed on `size`
    Stable { size: u64 },
    /// The size kept changing for all `checks` polls
    Unstable { checks: u32 },
    /// The file disappeared (or stopped being a regular file)
    Vanished,
    /// Polling failed; treated as unstable
    Failed(String),
}

impl Stability {
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable { .. })
    }
}

/// Polls a file's size until it stops changing or the budget runs out
#[derive(Debug, Clone)]
pub struct StabilityDetector<P = FsProbe> {
    probe: P,
    interval: Duration,
    max_checks: u32,
}

impl StabilityDetector<FsProbe> {
    pub fn new(config: &StabilityConfig) -> Self {
        Self::with_probe(FsProbe, config.check_interval(), config.max_checks)
    }
}

impl<P: FileProbe> StabilityDetector<P> {
    /// `max_checks` below 2 is raised to 2, the minimum able to compare sizes
    pub fn with_probe(probe: P, interval: Duration, max_checks: u32) -> Self {
        Self {
            probe,
            interval,
            max_checks: max_checks.max(2),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_checks(&self) -> u32 {
        self.max_checks
    }

    /// Whether the file at `path` has finished being written
    pub async fn is_stable(&self, path: &Path) -> bool {
        self.check(path).await.is_stable()
    }

    /// Run the polling loop and report why it ended
    ///
    /// Sleeps `interval` between polls but not after the last one, so the
    /// worst case takes `(max_checks - 1) * interval`.
    pub async fn check(&self, path: &Path) -> Stability {
        let mut previous: Option<u64> = None;

        for check in 1..=self.max_checks {
            match self.probe.size(path).await {
                Ok(Some(size)) => {
                    trace!(path = %path.display(), check, size, "Polled file size");
                    if previous == Some(size) {
                        debug!(path = %path.display(), size, checks = check, "File is stable");
                        return Stability::Stable { size };
                    }
                    previous = Some(size);
                }
                Ok(None) => {
                    debug!(path = %path.display(), check, "File vanished during stability check");
                    return Stability::Vanished;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to poll file size");
                    return Stability::Failed(e.to_string());
                }
            }

            if check < self.max_checks {
                tokio::time::sleep(self.interval).await;
            }
        }

        Stability::Unstable {
            checks: self.max_checks,
        }
    }
}
