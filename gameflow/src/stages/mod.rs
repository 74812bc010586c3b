//! Stages, flows and the sequencer that runs them.
//!
//! A [`Stage`] is a named step with an optional precondition, an optional
//! action and an optional verification. A [`Flow`] is an ordered list of
//! stages, built once and run by the [`StageSequencer`].

mod listener;
mod report;
mod sequencer;

pub use listener::{NoOpListener, OutcomeListener};
pub use report::{SequenceReport, StageRecord};
pub use sequencer::StageSequencer;

use crate::context::FlowContext;
use crate::errors::FlowError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// Boxed future returned by stage closures.
pub type StageFuture<T> = BoxFuture<'static, Result<T, FlowError>>;

/// A precondition or verification.
pub type CheckFn = Arc<dyn Fn(FlowContext) -> StageFuture<bool> + Send + Sync>;

/// A stage action.
pub type ActionFn = Arc<dyn Fn(FlowContext) -> StageFuture<()> + Send + Sync>;

/// Hook run when a stage fails or blocks. Returns the evidence it captured.
pub type FailureHook =
    Arc<dyn Fn(FlowContext, FailureInfo) -> BoxFuture<'static, Option<PathBuf>> + Send + Sync>;

/// What the failure hook is told about the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    /// Flow name.
    pub flow: String,
    /// Stage name.
    pub stage: String,
    /// Failure reason.
    pub reason: String,
}

impl FailureInfo {
    /// Default evidence prefix, `DEBUG_{flow}_{stage}`.
    #[must_use]
    pub fn evidence_prefix(&self) -> String {
        format!("DEBUG_{}_{}", self.flow, self.stage)
    }
}

/// A described boolean check.
#[derive(Clone)]
pub(crate) struct Check {
    pub(crate) description: String,
    pub(crate) run: CheckFn,
}

/// One flow step.
#[derive(Clone)]
pub struct Stage {
    name: String,
    pub(crate) precondition: Option<Check>,
    pub(crate) action: Option<ActionFn>,
    pub(crate) verification: Option<Check>,
    pub(crate) on_failure: Option<FailureHook>,
}

impl Stage {
    /// Creates a stage with no checks and no action.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precondition: None,
            action: None,
            verification: None,
            on_failure: None,
        }
    }

    /// Stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the precondition. `false` blocks the stage and the rest of the flow.
    #[must_use]
    pub fn precondition<F, Fut>(mut self, description: impl Into<String>, check: F) -> Self
    where
        F: Fn(FlowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, FlowError>> + Send + 'static,
    {
        self.precondition = Some(Check {
            description: description.into(),
            run: Arc::new(move |ctx| check(ctx).boxed()),
        });
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(FlowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        self.action = Some(Arc::new(move |ctx| action(ctx).boxed()));
        self
    }

    /// Sets the verification. `false` fails the stage.
    #[must_use]
    pub fn verify<F, Fut>(mut self, description: impl Into<String>, check: F) -> Self
    where
        F: Fn(FlowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, FlowError>> + Send + 'static,
    {
        self.verification = Some(Check {
            description: description.into(),
            run: Arc::new(move |ctx| check(ctx).boxed()),
        });
        self
    }

    /// Replaces the default failure hook.
    #[must_use]
    pub fn on_failure<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(FlowContext, FailureInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<PathBuf>> + Send + 'static,
    {
        self.on_failure = Some(Arc::new(move |ctx, info| hook(ctx, info).boxed()));
        self
    }

    /// Returns true if a precondition is set.
    #[must_use]
    pub fn has_precondition(&self) -> bool {
        self.precondition.is_some()
    }

    /// Returns true if a verification is set.
    #[must_use]
    pub fn has_verification(&self) -> bool {
        self.verification.is_some()
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field(
                "precondition",
                &self.precondition.as_ref().map(|c| c.description.as_str()),
            )
            .field("action", &self.action.is_some())
            .field(
                "verification",
                &self.verification.as_ref().map(|c| c.description.as_str()),
            )
            .finish_non_exhaustive()
    }
}

/// A named, ordered list of stages.
#[derive(Debug, Clone)]
pub struct Flow {
    name: String,
    stages: Vec<Stage>,
}

impl Flow {
    /// Creates an empty flow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Flow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the flow has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_parts() {
        let stage = Stage::new("MainLogo")
            .precondition("app running", |_ctx| async { Ok(true) })
            .verify("logo visible", |_ctx| async { Ok(true) });
        assert_eq!(stage.name(), "MainLogo");
        assert!(stage.has_precondition());
        assert!(stage.has_verification());
        assert!(stage.action.is_none());
    }

    #[test]
    fn test_flow_keeps_order() {
        let flow = Flow::new("smoke")
            .stage(Stage::new("A"))
            .stage(Stage::new("B"))
            .stage(Stage::new("C"));
        assert_eq!(flow.stage_names(), vec!["A", "B", "C"]);
        assert_eq!(flow.len(), 3);
    }

    #[test]
    fn test_failure_prefix() {
        let info = FailureInfo {
            flow: "first_launch".into(),
            stage: "DownloadWait".into(),
            reason: "timed out".into(),
        };
        assert_eq!(info.evidence_prefix(), "DEBUG_first_launch_DownloadWait");
    }
}
