//! Synthetic touch gestures.
//!
//! Coordinates are resolved against a freshly fetched screen size on every
//! call, so orientation changes between gestures are picked up.

mod plan;

pub use plan::{
    drag_distance, drag_sequence, plan_adaptive, plan_offset, tap_sequence,
    DRAG_DISTANCE_PERCENT, OFFSET_PERCENT,
};

use crate::config::{DragStyle, GestureConfig};
use crate::core::{Point, ScreenCoordinate};
use crate::errors::FlowError;
use crate::transport::DeviceSession;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Dispatches taps and drags to the device.
#[derive(Clone)]
pub struct GestureDriver {
    session: Arc<dyn DeviceSession>,
    config: GestureConfig,
}

impl GestureDriver {
    /// Creates a driver.
    #[must_use]
    pub fn new(session: Arc<dyn DeviceSession>, config: GestureConfig) -> Self {
        Self { session, config }
    }

    /// Taps a point.
    pub async fn tap(&self, point: Point) -> Result<(), FlowError> {
        info!(x = point.x, y = point.y, "Tap");
        let hold = Duration::from_millis(self.config.tap_hold_ms);
        self.session.perform(&tap_sequence(point, hold)).await
    }

    /// Taps a fractional screen position.
    pub async fn tap_fraction(&self, coordinate: ScreenCoordinate) -> Result<(), FlowError> {
        let size = self.session.screen_size().await?;
        self.tap(coordinate.resolve(size)).await
    }

    /// Drags from one point to another over `duration`.
    pub async fn drag(&self, from: Point, to: Point, duration: Duration) -> Result<(), FlowError> {
        info!(
            from_x = from.x,
            from_y = from.y,
            to_x = to.x,
            to_y = to.y,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Drag"
        );
        self.session
            .perform(&drag_sequence(from, to, duration))
            .await
    }

    /// Drags leftward from the screen center.
    pub async fn drag_adaptive(&self) -> Result<(), FlowError> {
        let size = self.session.screen_size().await?;
        let (from, to) = plan_adaptive(size);
        self.drag(from, to, self.config.drag_duration()).await
    }

    /// Drags leftward from right of and below the center, clamped to the margin.
    pub async fn drag_with_offset(&self) -> Result<(), FlowError> {
        let size = self.session.screen_size().await?;
        let (from, to) = plan_offset(size, self.config.margin_px);
        self.drag(from, to, self.config.drag_duration()).await
    }

    /// The drag that starts the game, in the configured style.
    pub async fn cheek_drag(&self) -> Result<(), FlowError> {
        match self.config.drag_style {
            DragStyle::Adaptive => self.drag_adaptive().await,
            DragStyle::Offset => self.drag_with_offset().await,
        }
    }
}

impl std::fmt::Debug for GestureDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
