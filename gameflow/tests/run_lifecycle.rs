//! End-to-end runs through the orchestrator with a scripted device.

use gameflow::prelude::*;
use gameflow::testing::{
    write_synthetic_assets, FakeDevice, FakeSessionFactory, MemoryEvidenceStore, MemoryResultSink,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

const SPOT: Rect = Rect::new(500, 1000, 80, 40);

struct Harness {
    _assets: TempDir,
    factory: Arc<FakeSessionFactory>,
    sink: Arc<MemoryResultSink>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn device(&self) -> &Arc<FakeDevice> {
        self.factory.device()
    }
}

fn harness(with_assets: bool) -> Harness {
    let assets = TempDir::new().unwrap();
    if with_assets {
        write_synthetic_assets(assets.path()).unwrap();
    }
    let mut config = FlowConfig::default();
    config.assets.directory = assets.path().to_path_buf();

    let factory = Arc::new(FakeSessionFactory::new(Arc::new(FakeDevice::new())));
    let sink = Arc::new(MemoryResultSink::new());
    let orchestrator = Orchestrator::new(
        config,
        factory.clone(),
        Arc::new(MemoryEvidenceStore::new()),
        sink.clone(),
    )
    .unwrap();

    Harness {
        _assets: assets,
        factory,
        sink,
        orchestrator,
    }
}

#[tokio::test(start_paused = true)]
async fn missing_asset_aborts_before_connecting() {
    let h = harness(false);

    let err = h.orchestrator.run(Suite::Smoke).await.unwrap_err();

    assert!(matches!(err, FlowError::ResourceNotFound { .. }));
    assert_eq!(h.factory.connects(), 0);
    assert_eq!(h.device().call_count(), 0);
    assert!(h.sink.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn smoke_records_one_cell_per_case() {
    let h = harness(true);
    let device = h.device();
    device.show_marker(Marker::TargetLogo, SPOT);
    device.show_marker(Marker::GameStarted, SPOT);
    device.show_marker(Marker::ExitButton, SPOT);
    device.script_app_states([AppState::Foreground, AppState::NotRunning]);

    let report = h.orchestrator.run(Suite::Smoke).await.unwrap();

    assert!(report.passed());
    let names: Vec<_> = report.cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["StartApp", "MainLogo", "CheekDragStart", "GameExit"]);
    for a1 in ["F4", "F5", "F6", "F7"] {
        assert_eq!(h.sink.value_at(a1).as_deref(), Some("Pass"), "{a1}");
    }
    assert!(device.is_quit());
}

#[tokio::test(start_paused = true)]
async fn later_smoke_cases_still_recorded_after_a_failure() {
    let h = harness(true);

    let report = h.orchestrator.run(Suite::Smoke).await.unwrap();

    assert!(!report.passed());
    assert_eq!(h.sink.value_at("F4").as_deref(), Some("Pass"));
    assert_eq!(h.sink.value_at("F5").as_deref(), Some("Fail"));
    assert_eq!(h.sink.value_at("F6").as_deref(), Some("Block"));
    assert_eq!(h.sink.writes().len(), 4);
    let failed: Vec<_> = report.failures().map(|c| c.name.as_str()).collect();
    assert_eq!(failed, vec!["MainLogo", "CheekDragStart", "GameExit"]);
}

#[tokio::test(start_paused = true)]
async fn fatal_transport_error_quits_session() {
    let h = harness(true);
    h.device().fail_on("find_image", "instrumentation crashed");

    let err = h.orchestrator.run(Suite::Smoke).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(h.device().is_quit());
    assert_eq!(h.sink.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn refused_connection_is_reported() {
    let h = harness(true);
    h.factory.set_refusing(true);

    let err = h.orchestrator.run(Suite::Logout).await.unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(h.factory.connects(), 1);
    assert!(!h.device().is_quit());
}

#[tokio::test(start_paused = true)]
async fn cancelled_run_never_connects() {
    let h = harness(true);
    h.orchestrator.cancel_token().cancel("operator stop");

    let err = h.orchestrator.run(Suite::FirstLaunch).await.unwrap_err();

    assert!(matches!(err, FlowError::Interrupted(_)));
    assert_eq!(h.factory.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn single_flow_suite_records_aggregate() {
    let h = harness(true);
    h.device().show_marker(Marker::GoogleLogin, SPOT);
    h.device().show_marker(Marker::TargetLogo, SPOT);

    let report = h.orchestrator.run(Suite::ReLogin).await.unwrap();

    assert_eq!(report.cases.len(), 1);
    assert_eq!(report.cases[0].index, 7);
    assert_eq!(report.cases[0].name, "GoogleReLogin");
    assert_eq!(h.sink.value_at("F10").as_deref(), Some("Pass"));
}

#[tokio::test(start_paused = true)]
async fn failed_quit_keeps_a_passing_report() {
    let h = harness(true);
    h.device().show_marker(Marker::GoogleLogin, SPOT);
    h.device().show_marker(Marker::TargetLogo, SPOT);
    h.device().fail_on("quit", "session already gone");

    let report = h.orchestrator.run(Suite::ReLogin).await.unwrap();

    assert!(report.passed());
    assert!(h.device().is_quit());
    assert_eq!(h.sink.value_at("F10").as_deref(), Some("Pass"));
}

#[tokio::test(start_paused = true)]
async fn failed_quit_keeps_the_run_error() {
    let h = harness(true);
    h.device().fail_on("find_image", "instrumentation crashed");
    h.device().fail_on("quit", "session already gone");

    let err = h.orchestrator.run(Suite::Smoke).await.unwrap_err();

    assert!(err.to_string().contains("instrumentation crashed"), "{err}");
    assert!(h.device().is_quit());
}
