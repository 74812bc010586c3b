//! Run orchestration: assets, session lifecycle, suites and recording.

use crate::cancellation::CancellationToken;
use crate::config::FlowConfig;
use crate::context::FlowContext;
use crate::core::StageOutcome;
use crate::errors::FlowError;
use crate::flows::{first_launch_flow, first_login_flow, logout_flow, re_login_flow, smoke_suite};
use crate::recording::{EvidenceStore, ResultRecorder, ResultSink};
use crate::stages::{Flow, NoOpListener, SequenceReport, StageSequencer};
use crate::transport::{DeviceSession, SessionFactory};
use crate::vision::FlowAssets;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// A selectable group of test cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suite {
    /// TC01 to TC04, recorded one row per case.
    Smoke,
    /// Clean install through terms agreement.
    FirstLaunch,
    /// Google login with account selection.
    FirstLogin,
    /// Google login with a remembered account.
    ReLogin,
    /// Logout through the settings menu.
    Logout,
}

impl Suite {
    /// Every suite.
    pub const ALL: [Self; 5] = [
        Self::Smoke,
        Self::FirstLaunch,
        Self::FirstLogin,
        Self::ReLogin,
        Self::Logout,
    ];

    /// Command-line name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::FirstLaunch => "first_launch",
            Self::FirstLogin => "first_login",
            Self::ReLogin => "re_login",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|suite| suite.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(Suite::as_str).collect();
                format!("unknown suite '{s}', expected one of: {}", known.join(", "))
            })
    }
}

/// Result of one recorded test case.
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// Test case number.
    pub index: u32,
    /// Test case name.
    pub name: String,
    /// Recorded outcome.
    pub outcome: StageOutcome,
    /// Stage-level detail.
    pub report: SequenceReport,
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Suite that ran.
    pub suite: Suite,
    /// Recorded cases, in order.
    pub cases: Vec<CaseResult>,
}

impl RunReport {
    /// Returns true if every case passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.outcome.verdict.is_pass())
    }

    /// Cases that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| !c.outcome.verdict.is_pass())
    }
}

/// Runs suites against one device session at a time.
///
/// Assets are loaded before a session is opened, so a missing template
/// never touches the device. Once connected, the session is quit on every
/// exit path before any error is returned.
pub struct Orchestrator {
    config: Arc<FlowConfig>,
    factory: Arc<dyn SessionFactory>,
    evidence: Arc<dyn EvidenceStore>,
    sink: Arc<dyn ResultSink>,
    cancel: Arc<CancellationToken>,
}

impl Orchestrator {
    /// Validates `config` and builds an orchestrator.
    pub fn new(
        config: FlowConfig,
        factory: Arc<dyn SessionFactory>,
        evidence: Arc<dyn EvidenceStore>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, FlowError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            factory,
            evidence,
            sink,
            cancel: Arc::new(CancellationToken::new()),
        })
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that interrupts the run.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Runs `suite` in a fresh session.
    pub async fn run(&self, suite: Suite) -> Result<RunReport, FlowError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, suite = %suite);
        self.run_inner(run_id, suite).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, suite: Suite) -> Result<RunReport, FlowError> {
        let assets = Arc::new(FlowAssets::load(&self.config.assets.directory).await?);
        info!(templates = assets.len(), "Assets loaded");

        self.cancel.check()?;
        let session = self.factory.connect(&self.config).await?;
        info!(server = %self.config.appium.server_url, "Session opened");

        let ctx = FlowContext::new(
            session.clone(),
            self.config.clone(),
            assets,
            self.evidence.clone(),
            self.cancel.clone(),
        )
        .with_run_id(run_id);

        let result = self.run_suite(suite, &ctx).await;
        close(session.as_ref()).await;

        match result {
            Ok(cases) => {
                let report = RunReport {
                    run_id,
                    suite,
                    cases,
                };
                info!(passed = report.passed(), cases = report.cases.len(), "Run finished");
                Ok(report)
            }
            Err(err) => {
                error!(error = %err, kind = err.kind(), "Run aborted");
                Err(err)
            }
        }
    }

    async fn run_suite(&self, suite: Suite, ctx: &FlowContext) -> Result<Vec<CaseResult>, FlowError> {
        ctx.session()
            .set_implicit_wait(self.config.timeouts.implicit_default())
            .await?;

        let recorder = ResultRecorder::new(
            ctx.camera().clone(),
            self.sink.clone(),
            self.config.recording.clone(),
        );
        let numbers = self.config.test_cases;

        match suite {
            Suite::Smoke => {
                let mut cases = Vec::new();
                for case in smoke_suite() {
                    let report = StageSequencer::new()
                        .with_first_index(case.index)
                        .run(&case.flow, ctx, &recorder)
                        .await?;
                    let name = report
                        .records
                        .first()
                        .map_or_else(|| case.flow.name().to_string(), |r| r.name.clone());
                    cases.push(CaseResult {
                        index: case.index,
                        name,
                        outcome: report.aggregate(),
                        report,
                    });
                }
                Ok(cases)
            }
            Suite::FirstLaunch => {
                let flow = first_launch_flow();
                single(ctx, &recorder, numbers.first_launch, "FirstLaunchAndSetup", &flow).await
            }
            Suite::FirstLogin => {
                let flow = first_login_flow();
                single(ctx, &recorder, numbers.first_login, "GoogleFirstLogin", &flow).await
            }
            Suite::ReLogin => {
                let flow = re_login_flow();
                single(ctx, &recorder, numbers.re_login, "GoogleReLogin", &flow).await
            }
            Suite::Logout => {
                let flow = logout_flow();
                single(ctx, &recorder, numbers.logout, "Logout", &flow).await
            }
        }
    }
}

/// Runs a multi-stage flow and records its aggregate as one case.
async fn single(
    ctx: &FlowContext,
    recorder: &ResultRecorder,
    index: u32,
    name: &str,
    flow: &Flow,
) -> Result<Vec<CaseResult>, FlowError> {
    let report = StageSequencer::new().run(flow, ctx, &NoOpListener).await?;
    let outcome = report.aggregate();
    recorder.record(index, name, &outcome).await?;
    Ok(vec![CaseResult {
        index,
        name: name.to_string(),
        outcome,
        report,
    }])
}

/// Quits the session. A failed quit is logged and never replaces the run result.
async fn close(session: &dyn DeviceSession) {
    match session.quit().await {
        Ok(()) => info!("Session closed"),
        Err(err) => warn!(error = %err, "Session close failed"),
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("server", &self.config.appium.server_url)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_suite_parses_dashes_and_case() {
        assert_eq!("first-launch".parse::<Suite>().unwrap(), Suite::FirstLaunch);
        assert_eq!("RE_LOGIN".parse::<Suite>().unwrap(), Suite::ReLogin);
        assert!("nightly".parse::<Suite>().is_err());
    }

    #[test]
    fn test_suite_display_round_trip() {
        for suite in Suite::ALL {
            assert_eq!(suite.to_string().parse::<Suite>().unwrap(), suite);
        }
    }
}
