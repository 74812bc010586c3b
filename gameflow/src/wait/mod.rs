//! Waiting primitives.
//!
//! This module provides:
//! - [`PollingWaiter`] for bounded predicate polling
//! - [`DownloadCompletionDetector`] for the dwell-then-poll download wait

mod download;
mod polling;

pub use download::{DownloadCompletionDetector, DownloadPhase, DownloadReport};
pub use polling::PollingWaiter;
