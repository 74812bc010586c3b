//! Outcome listener trait.

use crate::core::StageOutcome;
use crate::errors::FlowError;
use async_trait::async_trait;

/// Receives every stage outcome in execution order.
///
/// Stages that were never attempted produce no call.
#[async_trait]
pub trait OutcomeListener: Send + Sync {
    /// Called once per executed stage.
    async fn on_outcome(
        &self,
        index: u32,
        stage: &str,
        outcome: &StageOutcome,
    ) -> Result<(), FlowError>;
}

/// A listener that discards all outcomes.
///
/// Used when only the aggregate of a flow is recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpListener;

#[async_trait]
impl OutcomeListener for NoOpListener {
    async fn on_outcome(
        &self,
        _index: u32,
        _stage: &str,
        _outcome: &StageOutcome,
    ) -> Result<(), FlowError> {
        Ok(())
    }
}
