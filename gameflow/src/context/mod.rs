//! Per-run flow context.
//!
//! [`FlowContext`] bundles the session and every component built on it. It
//! is cheap to clone and is handed by value to each stage closure.

use crate::cancellation::CancellationToken;
use crate::config::{FlowConfig, WaitSpec};
use crate::errors::FlowError;
use crate::gesture::GestureDriver;
use crate::recording::{EvidenceCamera, EvidenceStore};
use crate::transport::DeviceSession;
use crate::vision::{FlowAssets, ImageMatcher, Marker, TemplateImage};
use crate::wait::PollingWaiter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Everything a stage needs to act on the device.
#[derive(Clone)]
pub struct FlowContext {
    run_id: Uuid,
    session: Arc<dyn DeviceSession>,
    config: Arc<FlowConfig>,
    assets: Arc<FlowAssets>,
    cancel: Arc<CancellationToken>,
    waiter: PollingWaiter,
    matcher: ImageMatcher,
    gestures: GestureDriver,
    camera: EvidenceCamera,
}

impl FlowContext {
    /// Builds a context and its components from a validated configuration.
    #[must_use]
    pub fn new(
        session: Arc<dyn DeviceSession>,
        config: Arc<FlowConfig>,
        assets: Arc<FlowAssets>,
        evidence: Arc<dyn EvidenceStore>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        let waiter = PollingWaiter::new(cancel.clone());
        let matcher = ImageMatcher::new(
            session.clone(),
            waiter.clone(),
            config.timeouts.visibility_tolerance(),
            config.timeouts.poll_interval(),
        );
        let gestures = GestureDriver::new(session.clone(), config.gestures.clone());
        let camera = EvidenceCamera::new(session.clone(), evidence);
        Self {
            run_id: Uuid::new_v4(),
            session,
            config,
            assets,
            cancel,
            waiter,
            matcher,
            gestures,
            camera,
        }
    }

    /// Replaces the generated run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The device session.
    #[must_use]
    pub fn session(&self) -> &dyn DeviceSession {
        self.session.as_ref()
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Package of the app under test.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.config.appium.app_package
    }

    /// Cancellation token of the run.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Polling waiter.
    #[must_use]
    pub fn waiter(&self) -> &PollingWaiter {
        &self.waiter
    }

    /// Image matcher.
    #[must_use]
    pub fn matcher(&self) -> &ImageMatcher {
        &self.matcher
    }

    /// Gesture driver.
    #[must_use]
    pub fn gestures(&self) -> &GestureDriver {
        &self.gestures
    }

    /// Evidence camera.
    #[must_use]
    pub fn camera(&self) -> &EvidenceCamera {
        &self.camera
    }

    /// Template for a marker.
    pub fn template(&self, marker: Marker) -> Result<&TemplateImage, FlowError> {
        self.assets.get(marker)
    }

    /// Wait spec for `timeout` with the shared poll interval.
    pub fn wait_spec(&self, timeout: Duration) -> Result<WaitSpec, FlowError> {
        Ok(self.config.timeouts.wait_spec(timeout)?)
    }

    /// Cancellable fixed pause.
    pub async fn settle(&self, millis: u64) -> Result<(), FlowError> {
        self.cancel.sleep(Duration::from_millis(millis)).await
    }

    /// Waits up to `timeout` for a marker.
    pub async fn wait_marker(&self, marker: Marker, timeout: Duration) -> Result<bool, FlowError> {
        let spec = self.wait_spec(timeout)?;
        self.matcher.wait_visible(self.template(marker)?, spec).await
    }

    /// Waits up to `timeout` for a marker and taps its center.
    ///
    /// A marker that never appears is a [`FlowError::Timeout`].
    pub async fn tap_marker(&self, marker: Marker, timeout: Duration) -> Result<(), FlowError> {
        let template = self.template(marker)?;
        let center = self
            .matcher
            .locate_center(template, timeout)
            .await?
            .ok_or_else(|| FlowError::timeout(template.name(), timeout))?;
        info!(marker = %template.name(), x = center.x, y = center.y, "Tapping marker");
        self.gestures.tap(center).await
    }

    /// Best-effort screenshot.
    pub async fn capture_evidence(&self, prefix: &str) -> Option<PathBuf> {
        self.camera.capture_best_effort(prefix).await
    }
}

impl std::fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("run_id", &self.run_id)
            .field("package", &self.package())
            .finish_non_exhaustive()
    }
}
