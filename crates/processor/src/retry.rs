//! Bounded retry schedule for persistence failures

use dropwatch_core::WorkerConfig;
use std::time::Duration;

/// How many attempts a task gets and how long to wait between them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// `max_attempts` of zero is treated as one
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delays,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delays())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based)
    ///
    /// `None` once `attempt` was the last one. Delay `i` is used before attempt
    /// `i + 1`; the last configured delay repeats if attempts outnumber delays,
    /// and an empty delay list retries immediately.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let index = attempt.saturating_sub(1) as usize;
        Some(
            self.delays
                .get(index)
                .or_else(|| self.delays.last())
                .copied()
                .unwrap_or(Duration::ZERO),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}
