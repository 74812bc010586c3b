//! Turns stage outcomes into evidence and a result cell.

use super::{CellAddress, EvidenceCamera, ResultSink};
use crate::config::RecordingConfig;
use crate::core::{StageOutcome, Verdict};
use crate::errors::FlowError;
use crate::stages::OutcomeListener;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// What one `record` call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResult {
    /// Test-case index.
    pub index: u32,
    /// Cell that was written.
    pub cell: CellAddress,
    /// Value written.
    pub verdict: Verdict,
    /// Screenshot, when capture succeeded.
    pub evidence: Option<PathBuf>,
}

/// Records outcomes: screenshot first, then the cell write.
///
/// The recorder never decides verdicts. A failed screenshot is logged and
/// does not prevent the write.
#[derive(Clone)]
pub struct ResultRecorder {
    camera: EvidenceCamera,
    sink: Arc<dyn ResultSink>,
    recording: RecordingConfig,
}

impl ResultRecorder {
    /// Creates a recorder.
    #[must_use]
    pub fn new(camera: EvidenceCamera, sink: Arc<dyn ResultSink>, recording: RecordingConfig) -> Self {
        Self {
            camera,
            sink,
            recording,
        }
    }

    /// Evidence prefix for a test case, e.g. `TC03_CheekDragStart_Fail`.
    #[must_use]
    pub fn evidence_prefix(index: u32, name: &str, verdict: Verdict) -> String {
        format!("TC{index:02}_{name}_{verdict}")
    }

    /// Records one outcome.
    pub async fn record(
        &self,
        index: u32,
        name: &str,
        outcome: &StageOutcome,
    ) -> Result<RecordedResult, FlowError> {
        let prefix = Self::evidence_prefix(index, name, outcome.verdict);
        let evidence = self.camera.capture_best_effort(&prefix).await;

        let cell = CellAddress::for_index(&self.recording, index);
        self.sink
            .write_cell(&cell, outcome.verdict.as_sheet_value())
            .await?;

        info!(
            index,
            test_case = %name,
            verdict = %outcome.verdict,
            cell = %cell,
            reason = %outcome.reason_or_empty(),
            "Result recorded"
        );
        Ok(RecordedResult {
            index,
            cell,
            verdict: outcome.verdict,
            evidence,
        })
    }
}

#[async_trait]
impl OutcomeListener for ResultRecorder {
    async fn on_outcome(
        &self,
        index: u32,
        stage: &str,
        outcome: &StageOutcome,
    ) -> Result<(), FlowError> {
        self.record(index, stage, outcome).await.map(|_| ())
    }
}

impl std::fmt::Debug for ResultRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultRecorder")
            .field("recording", &self.recording)
            .finish_non_exhaustive()
    }
}
