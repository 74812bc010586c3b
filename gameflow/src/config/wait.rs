//! Validated wait bounds.

use crate::errors::ConfigError;
use std::time::Duration;

/// Bounds for one polling wait.
///
/// The poll interval is always strictly shorter than the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    timeout: Duration,
    poll_interval: Duration,
}

impl WaitSpec {
    /// Creates a wait spec, rejecting `poll_interval >= timeout` and a zero interval.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Result<Self, ConfigError> {
        if poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll_interval".into()));
        }
        if poll_interval >= timeout {
            return Err(ConfigError::IntervalNotBelowTimeout {
                interval: poll_interval,
                timeout,
            });
        }
        Ok(Self {
            timeout,
            poll_interval,
        })
    }

    /// Creates a wait spec from whole seconds.
    pub fn from_secs(timeout: u64, poll_interval: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_secs(timeout), Duration::from_secs(poll_interval))
    }

    /// Upper bound on the wait.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pause between probes.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Bounds for the download completion detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadWait {
    minimum_dwell: Duration,
    maximum_total: Duration,
    poll_interval: Duration,
    progress_interval: Duration,
}

impl DownloadWait {
    /// Creates download bounds.
    ///
    /// Requires `minimum_dwell < maximum_total` and non-zero intervals.
    pub fn new(
        minimum_dwell: Duration,
        maximum_total: Duration,
        poll_interval: Duration,
        progress_interval: Duration,
    ) -> Result<Self, ConfigError> {
        if poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("download.check_interval".into()));
        }
        if progress_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("download.progress_interval".into()));
        }
        if minimum_dwell >= maximum_total {
            return Err(ConfigError::DwellNotBelowMaximum {
                dwell: minimum_dwell,
                maximum: maximum_total,
            });
        }
        Ok(Self {
            minimum_dwell,
            maximum_total,
            poll_interval,
            progress_interval,
        })
    }

    /// Time that must pass before the first check.
    #[must_use]
    pub const fn minimum_dwell(&self) -> Duration {
        self.minimum_dwell
    }

    /// Ceiling measured from the start of the dwell.
    #[must_use]
    pub const fn maximum_total(&self) -> Duration {
        self.maximum_total
    }

    /// Pause between checks after the dwell.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Chunk size of the dwell sleep, one progress log per chunk.
    #[must_use]
    pub const fn progress_interval(&self) -> Duration {
        self.progress_interval
    }
}
