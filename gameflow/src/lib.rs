//! # Gameflow
//!
//! UI flow automation for mobile games that render through one opaque
//! surface, driven over Appium.
//!
//! Gameflow provides:
//!
//! - **Template matching**: locate on-screen UI by image, with a scoped implicit wait
//! - **Bounded polling**: tell "not yet ready" apart from real failures
//! - **Download detection**: a fixed dwell followed by bounded completion checks
//! - **Stage sequencing**: precondition, action and verification per stage, fail-fast with Block
//! - **Result recording**: screenshot evidence and one spreadsheet cell per outcome
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gameflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = FlowConfig::load("gameflow.json")?;
//! let orchestrator = Orchestrator::new(
//!     config,
//!     Arc::new(AppiumSessionFactory),
//!     Arc::new(FsEvidenceStore::new("build/reports/evidence")),
//!     Arc::new(JsonlResultSink::new("results.jsonl")),
//! )?;
//! let report = orchestrator.run(Suite::Smoke).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod flows;
pub mod gesture;
pub mod observability;
pub mod recording;
pub mod runner;
pub mod stages;
pub mod testing;
pub mod transport;
pub mod vision;
pub mod wait;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{DownloadWait, DragStyle, FlowConfig, WaitSpec};
    pub use crate::context::FlowContext;
    pub use crate::core::{AppState, Point, Rect, ScreenCoordinate, ScreenSize, StageOutcome, Verdict};
    pub use crate::errors::{ConfigError, FlowError, TransportError};
    pub use crate::flows::{
        first_launch_flow, first_login_flow, logout_flow, re_login_flow, smoke_suite,
    };
    pub use crate::gesture::GestureDriver;
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::recording::{
        CellAddress, EvidenceStore, FsEvidenceStore, GoogleSheetsSink, JsonlResultSink,
        ResultRecorder, ResultSink,
    };
    pub use crate::runner::{Orchestrator, RunReport, Suite};
    pub use crate::stages::{Flow, OutcomeListener, SequenceReport, Stage, StageSequencer};
    pub use crate::transport::{AppiumSessionFactory, DeviceSession, SessionFactory};
    pub use crate::vision::{FlowAssets, ImageMatcher, Marker, TemplateImage};
    pub use crate::wait::{DownloadCompletionDetector, DownloadReport, PollingWaiter};
}
