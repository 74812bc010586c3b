//! Resource-download completion detection.
//!
//! The download bar is drawn inside the game surface and the completion
//! marker can flash up early, so the detector refuses to look at all until a
//! minimum dwell has passed. After the dwell it checks for the marker on a
//! fixed interval until it is seen or the ceiling is hit.
//!
//! ```text
//! Waiting --dwell elapsed--> Checking --marker seen--> Completed
//!                                     --ceiling hit--> TimedOut
//! ```

use crate::cancellation::CancellationToken;
use crate::config::DownloadWait;
use crate::errors::FlowError;
use crate::recording::EvidenceCamera;
use crate::vision::{ImageMatcher, TemplateImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Checks between two info-level progress lines.
const PROGRESS_LOG_EVERY: u32 = 6;

/// Detector phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPhase {
    /// Dwelling, no checks made.
    Waiting,
    /// Checking for the marker.
    Checking,
    /// Marker seen after the dwell.
    Completed,
    /// Ceiling reached without the marker.
    TimedOut,
}

impl DownloadPhase {
    /// Returns true for `Completed` and `TimedOut`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut)
    }
}

/// Result of one detection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Final phase.
    pub phase: DownloadPhase,
    /// Each phase entered, with the elapsed time at entry.
    pub transitions: Vec<(DownloadPhase, Duration)>,
    /// Total time since the dwell began.
    pub elapsed: Duration,
    /// Number of marker checks made.
    pub checks: u32,
    /// Confirmation or diagnostic screenshot.
    pub evidence: Option<PathBuf>,
}

impl DownloadReport {
    /// Returns true if the download was confirmed.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.phase == DownloadPhase::Completed
    }
}

/// Two-phase dwell-then-poll detector.
#[derive(Debug, Clone)]
pub struct DownloadCompletionDetector {
    bounds: DownloadWait,
    cancel: Arc<CancellationToken>,
}

impl DownloadCompletionDetector {
    /// Creates a detector.
    #[must_use]
    pub fn new(bounds: DownloadWait, cancel: Arc<CancellationToken>) -> Self {
        Self { bounds, cancel }
    }

    /// Runs the detector against `marker`.
    ///
    /// Returns a report for both `Completed` and `TimedOut`. Cancellation and
    /// fatal transport errors are returned as errors.
    pub async fn detect(
        &self,
        matcher: &ImageMatcher,
        marker: &TemplateImage,
        camera: &EvidenceCamera,
    ) -> Result<DownloadReport, FlowError> {
        let started = Instant::now();
        let mut transitions = vec![(DownloadPhase::Waiting, Duration::ZERO)];

        info!(
            marker = %marker.name(),
            dwell_secs = self.bounds.minimum_dwell().as_secs(),
            ceiling_secs = self.bounds.maximum_total().as_secs(),
            "Download dwell started"
        );
        self.dwell().await?;

        transitions.push((DownloadPhase::Checking, started.elapsed()));
        info!(elapsed_secs = started.elapsed().as_secs(), "Download checks started");

        let deadline = started + self.bounds.maximum_total();
        let mut checks: u32 = 0;
        loop {
            self.cancel.check()?;
            checks += 1;
            let visible = matcher.is_visible(marker).await?;
            let elapsed = started.elapsed();

            if checks % PROGRESS_LOG_EVERY == 0 {
                info!(checks, elapsed_secs = elapsed.as_secs(), visible, "Download check");
            } else {
                debug!(checks, elapsed_secs = elapsed.as_secs(), visible, "Download check");
            }

            if visible {
                transitions.push((DownloadPhase::Completed, elapsed));
                info!(elapsed_secs = elapsed.as_secs(), checks, "Download completed");
                let evidence = camera
                    .capture_best_effort(&format!(
                        "DEBUG_download_complete_verified_{}sec",
                        elapsed.as_secs()
                    ))
                    .await;
                return Ok(DownloadReport {
                    phase: DownloadPhase::Completed,
                    transitions,
                    elapsed,
                    checks,
                    evidence,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                transitions.push((DownloadPhase::TimedOut, elapsed));
                warn!(elapsed_secs = elapsed.as_secs(), checks, "Download timed out");
                let evidence = camera
                    .capture_best_effort(&format!("DEBUG_download_timeout_{}sec", elapsed.as_secs()))
                    .await;
                return Ok(DownloadReport {
                    phase: DownloadPhase::TimedOut,
                    transitions,
                    elapsed,
                    checks,
                    evidence,
                });
            }
            self.cancel
                .sleep(self.bounds.poll_interval().min(deadline - now))
                .await?;
        }
    }

    /// Sleeps through the dwell in progress-sized chunks.
    async fn dwell(&self) -> Result<(), FlowError> {
        let dwell = self.bounds.minimum_dwell();
        let mut waited = Duration::ZERO;
        while waited < dwell {
            let chunk = self.bounds.progress_interval().min(dwell - waited);
            self.cancel.sleep(chunk).await?;
            waited += chunk;
            info!(
                waited_secs = waited.as_secs(),
                remaining_secs = (dwell - waited).as_secs(),
                "Download dwell progress"
            );
        }
        Ok(())
    }
}
