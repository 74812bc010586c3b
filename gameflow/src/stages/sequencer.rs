//! Ordered stage execution with fail-fast and Block semantics.

use super::{Check, FailureInfo, Flow, OutcomeListener, SequenceReport, Stage, StageRecord};
use crate::context::FlowContext;
use crate::core::StageOutcome;
use crate::errors::FlowError;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Runs a [`Flow`] stage by stage.
///
/// For each stage, in order:
/// 1. a false precondition blocks the stage and ends the run;
/// 2. a non-fatal action error fails the stage and ends the run;
/// 3. a false verification fails the stage and ends the run;
/// 4. otherwise the stage passes and the next one starts.
///
/// Non-fatal errors become outcomes. Fatal errors (transport, cancellation,
/// missing assets, sink) propagate and abort the run. Nothing is retried.
#[derive(Debug, Clone, Copy)]
pub struct StageSequencer {
    first_index: u32,
}

impl Default for StageSequencer {
    fn default() -> Self {
        Self { first_index: 1 }
    }
}

enum CheckResult {
    Held,
    Broken(String),
}

impl StageSequencer {
    /// Creates a sequencer numbering stages from 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index of the first stage.
    #[must_use]
    pub fn with_first_index(mut self, first_index: u32) -> Self {
        self.first_index = first_index;
        self
    }

    /// Runs `flow`, forwarding each outcome to `listener`.
    pub async fn run(
        &self,
        flow: &Flow,
        ctx: &FlowContext,
        listener: &dyn OutcomeListener,
    ) -> Result<SequenceReport, FlowError> {
        let mut report = SequenceReport {
            flow: flow.name().to_string(),
            ..SequenceReport::default()
        };
        info!(flow = %flow.name(), stages = flow.len(), "Flow started");

        let mut index = self.first_index;
        for (position, stage) in flow.stages().iter().enumerate() {
            ctx.cancel_token().check()?;
            let started = Instant::now();

            let span = info_span!("stage", flow = %flow.name(), stage = %stage.name(), index);
            let outcome = self.run_stage(flow, stage, ctx).instrument(span).await?;
            let elapsed = started.elapsed();

            info!(
                flow = %flow.name(),
                stage = %stage.name(),
                index,
                verdict = %outcome.verdict,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "[{}] {} -> {}",
                index,
                stage.name(),
                outcome.summary()
            );
            listener.on_outcome(index, stage.name(), &outcome).await?;

            let stop = !outcome.verdict.is_pass();
            report.records.push(StageRecord {
                index,
                name: stage.name().to_string(),
                outcome,
                elapsed,
            });

            if stop {
                for skipped in &flow.stages()[position + 1..] {
                    warn!(flow = %flow.name(), stage = %skipped.name(), "Stage not attempted");
                    report.not_run.push(skipped.name().to_string());
                }
                break;
            }
            index += 1;
        }

        info!(flow = %flow.name(), passed = report.passed(), "Flow finished");
        Ok(report)
    }

    async fn run_stage(
        &self,
        flow: &Flow,
        stage: &Stage,
        ctx: &FlowContext,
    ) -> Result<StageOutcome, FlowError> {
        if let Some(precondition) = &stage.precondition {
            if let CheckResult::Broken(reason) = evaluate(precondition, ctx, "precondition").await? {
                let evidence = Self::on_failure(flow, stage, ctx, &reason).await;
                return Ok(attach(StageOutcome::block(reason), evidence));
            }
        }

        if let Some(action) = &stage.action {
            match action(ctx.clone()).await {
                Ok(()) => {}
                Err(err) if !err.is_fatal() => {
                    let reason = err.to_string();
                    let evidence = Self::on_failure(flow, stage, ctx, &reason).await;
                    return Ok(attach(StageOutcome::fail(reason), evidence));
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(verification) = &stage.verification {
            if let CheckResult::Broken(reason) = evaluate(verification, ctx, "verification").await? {
                let evidence = Self::on_failure(flow, stage, ctx, &reason).await;
                return Ok(attach(StageOutcome::fail(reason), evidence));
            }
        }

        Ok(StageOutcome::pass())
    }

    async fn on_failure(
        flow: &Flow,
        stage: &Stage,
        ctx: &FlowContext,
        reason: &str,
    ) -> Option<PathBuf> {
        let info = FailureInfo {
            flow: flow.name().to_string(),
            stage: stage.name().to_string(),
            reason: reason.to_string(),
        };
        match &stage.on_failure {
            Some(hook) => hook(ctx.clone(), info).await,
            None => ctx.capture_evidence(&info.evidence_prefix()).await,
        }
    }
}

/// Runs a check, turning `false` and non-fatal errors into a reason.
async fn evaluate(check: &Check, ctx: &FlowContext, kind: &str) -> Result<CheckResult, FlowError> {
    match (check.run)(ctx.clone()).await {
        Ok(true) => Ok(CheckResult::Held),
        Ok(false) => Ok(CheckResult::Broken(format!(
            "{kind} not met: {}",
            check.description
        ))),
        Err(err) if !err.is_fatal() => Ok(CheckResult::Broken(format!(
            "{kind} '{}' errored: {err}",
            check.description
        ))),
        Err(err) => Err(err),
    }
}

fn attach(outcome: StageOutcome, evidence: Option<PathBuf>) -> StageOutcome {
    match evidence {
        Some(path) => outcome.with_evidence(path),
        None => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Verdict;
    use crate::errors::TransportError;
    use crate::testing::{
        assert_block, assert_reason_contains, assert_verdicts, CollectingListener, TestContext,
    };
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counted(name: &str, runs: &Arc<AtomicUsize>) -> Stage {
        let runs = runs.clone();
        Stage::new(name).action(move |_ctx: FlowContext| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn failing_check(name: &str) -> Stage {
        Stage::new(name).verify("marker visible", |_ctx: FlowContext| async { Ok(false) })
    }

    #[tokio::test]
    async fn test_fail_stops_remaining_stages() {
        let t = TestContext::new();
        let a_runs = Arc::new(AtomicUsize::new(0));
        let c_runs = Arc::new(AtomicUsize::new(0));
        let flow = Flow::new("demo")
            .stage(counted("A", &a_runs))
            .stage(failing_check("B"))
            .stage(counted("C", &c_runs));
        let listener = CollectingListener::new();

        let report = StageSequencer::new().run(&flow, &t.ctx, &listener).await.unwrap();

        assert_verdicts(&report, &[("A", Verdict::Pass), ("B", Verdict::Fail)]);
        assert_eq!(report.not_run, vec!["C".to_string()]);
        assert_eq!(a_runs.load(Ordering::SeqCst), 1);
        assert_eq!(c_runs.load(Ordering::SeqCst), 0);
        assert_eq!(listener.stage_names(), vec!["A".to_string(), "B".to_string()]);
        assert!(!report.passed());
        assert_eq!(t.evidence.prefixes(), vec!["DEBUG_demo_B".to_string()]);
    }

    #[tokio::test]
    async fn test_false_precondition_blocks_without_running_stage() {
        let t = TestContext::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let verify_runs = Arc::new(AtomicUsize::new(0));
        let counter = verify_runs.clone();
        let action_runs = runs.clone();
        let flow = Flow::new("demo")
            .stage(
                Stage::new("A")
                    .precondition("app running", |_ctx: FlowContext| async { Ok(false) })
                    .action(move |_ctx: FlowContext| {
                        let runs = action_runs.clone();
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    })
                    .verify("never", move |_ctx: FlowContext| {
                        let runs = counter.clone();
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            Ok(true)
                        }
                    }),
            )
            .stage(counted("B", &runs));
        let listener = CollectingListener::new();

        let report = StageSequencer::new().run(&flow, &t.ctx, &listener).await.unwrap();

        let outcome = &report.records[0].outcome;
        assert_block(outcome);
        assert_eq!(outcome.reason.as_deref(), Some("precondition not met: app running"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(verify_runs.load(Ordering::SeqCst), 0);
        assert_eq!(report.not_run, vec!["B".to_string()]);
        assert_eq!(listener.len(), 1);
        assert_eq!(report.aggregate().verdict, Verdict::Block);
    }

    #[tokio::test]
    async fn test_non_fatal_precondition_error_blocks() {
        let t = TestContext::new();
        let flow = Flow::new("demo").stage(Stage::new("A").precondition(
            "logo visible",
            |_ctx: FlowContext| async { Err(FlowError::timeout("logo", Duration::from_secs(10))) },
        ));

        let report = StageSequencer::new()
            .run(&flow, &t.ctx, &CollectingListener::new())
            .await
            .unwrap();

        let outcome = &report.records[0].outcome;
        assert_block(outcome);
        assert_reason_contains(outcome, "precondition 'logo visible' errored");
    }

    #[tokio::test]
    async fn test_action_precondition_error_after_held_precondition_fails() {
        let t = TestContext::new();
        let flow = Flow::new("demo").stage(
            Stage::new("A")
                .precondition("app started", |_ctx: FlowContext| async { Ok(true) })
                .action(|_ctx: FlowContext| async {
                    Err(FlowError::precondition("A", "late"))
                }),
        );

        let report = StageSequencer::new()
            .run(&flow, &t.ctx, &CollectingListener::new())
            .await
            .unwrap();

        assert_eq!(report.records[0].outcome.verdict, Verdict::Fail);
        assert_reason_contains(&report.records[0].outcome, "late");
    }

    #[tokio::test]
    async fn test_non_fatal_action_error_fails_with_message() {
        let t = TestContext::new();
        let flow = Flow::new("demo").stage(Stage::new("A").action(|_ctx: FlowContext| async {
            Err(FlowError::timeout("download_button", Duration::from_secs(30)))
        }));

        let report = StageSequencer::new()
            .run(&flow, &t.ctx, &CollectingListener::new())
            .await
            .unwrap();

        let outcome = &report.records[0].outcome;
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_reason_contains(outcome, "download_button");
    }

    #[tokio::test]
    async fn test_fatal_action_error_propagates() {
        let t = TestContext::new();
        let later = Arc::new(AtomicUsize::new(0));
        let flow = Flow::new("demo")
            .stage(Stage::new("A").action(|_ctx: FlowContext| async {
                Err(FlowError::from(TransportError::SessionClosed))
            }))
            .stage(counted("B", &later));
        let listener = CollectingListener::new();

        let err = StageSequencer::new()
            .run(&flow, &t.ctx, &listener)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(listener.is_empty());
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_listener_error_propagates() {
        let t = TestContext::new();
        let flow = Flow::new("demo").stage(counted("A", &Arc::new(AtomicUsize::new(0))));

        let err = StageSequencer::new()
            .run(&flow, &t.ctx, &CollectingListener::failing())
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Sink(_)));
    }

    #[tokio::test]
    async fn test_indices_start_at_first_index() {
        let t = TestContext::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let flow = Flow::new("demo")
            .stage(counted("A", &runs))
            .stage(counted("B", &runs));
        let listener = CollectingListener::new();

        let report = StageSequencer::new()
            .with_first_index(5)
            .run(&flow, &t.ctx, &listener)
            .await
            .unwrap();

        let indices: Vec<u32> = report.records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![5, 6]);
        assert!(report.passed());
        assert_eq!(listener.outcomes()[1].0, 6);
    }

    #[tokio::test]
    async fn test_custom_failure_hook_evidence_is_attached() {
        let t = TestContext::new();
        let flow = Flow::new("demo").stage(failing_check("A").on_failure(
            |_ctx: FlowContext, info: FailureInfo| async move {
                Some(PathBuf::from(format!("{}.png", info.stage)))
            },
        ));

        let report = StageSequencer::new()
            .run(&flow, &t.ctx, &CollectingListener::new())
            .await
            .unwrap();

        assert_eq!(
            report.records[0].outcome.evidence(),
            Some(std::path::Path::new("A.png"))
        );
        assert!(t.evidence.prefixes().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_is_interrupted() {
        let t = TestContext::new();
        t.cancel.cancel("stop");
        let flow = Flow::new("demo").stage(counted("A", &Arc::new(AtomicUsize::new(0))));

        let err = StageSequencer::new()
            .run(&flow, &t.ctx, &CollectingListener::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Interrupted(reason) if reason == "stop"));
    }
}
