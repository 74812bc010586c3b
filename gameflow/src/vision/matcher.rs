//! Template presence and location on the live screen.

use super::TemplateImage;
use crate::config::WaitSpec;
use crate::core::{Point, Rect};
use crate::errors::FlowError;
use crate::transport::{with_implicit_wait, DeviceSession};
use crate::wait::PollingWaiter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Answers "is this template on screen, and where".
///
/// Every probe runs one `-image` lookup with the implicit wait temporarily
/// set to the visibility tolerance. The matcher never changes app state.
#[derive(Clone)]
pub struct ImageMatcher {
    session: Arc<dyn DeviceSession>,
    waiter: PollingWaiter,
    tolerance: Duration,
    poll_interval: Duration,
}

impl ImageMatcher {
    /// Creates a matcher.
    #[must_use]
    pub fn new(
        session: Arc<dyn DeviceSession>,
        waiter: PollingWaiter,
        tolerance: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            waiter,
            tolerance,
            poll_interval,
        }
    }

    /// Rectangle of the match, or `None` if the template is not on screen now.
    pub async fn locate(&self, template: &TemplateImage) -> Result<Option<Rect>, FlowError> {
        let session = self.session.as_ref();
        let found = with_implicit_wait(session, self.tolerance, || async move {
            match session.find_image(template).await {
                Ok(rect) => Ok(Some(rect)),
                Err(err) if err.is_not_yet_ready() => Ok(None),
                Err(err) => Err(err),
            }
        })
        .await?;
        debug!(template = %template.name(), found = found.is_some(), "Image probe");
        Ok(found)
    }

    /// Whether the template is on screen now.
    pub async fn is_visible(&self, template: &TemplateImage) -> Result<bool, FlowError> {
        Ok(self.locate(template).await?.is_some())
    }

    /// Polls until the template is visible, returning its center.
    pub async fn locate_center(
        &self,
        template: &TemplateImage,
        timeout: Duration,
    ) -> Result<Option<Point>, FlowError> {
        let spec = WaitSpec::new(timeout, self.poll_interval)?;
        let rect = self
            .waiter
            .wait_for(template.name(), spec, || self.locate(template))
            .await?;
        Ok(rect.map(|r| r.center()))
    }

    /// Polls until the template is visible.
    pub async fn wait_visible(
        &self,
        template: &TemplateImage,
        spec: WaitSpec,
    ) -> Result<bool, FlowError> {
        let visible = self
            .waiter
            .wait_until(template.name(), spec, || self.is_visible(template))
            .await?;
        info!(template = %template.name(), visible, "Visibility wait finished");
        Ok(visible)
    }

    /// Polls until any of `templates` is visible.
    ///
    /// Returns the index of the first template seen, so callers can tell
    /// which end state was reached.
    pub async fn wait_any_visible(
        &self,
        templates: &[&TemplateImage],
        spec: WaitSpec,
    ) -> Result<Option<usize>, FlowError> {
        let label = templates
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join("|");
        let matched = self
            .waiter
            .wait_for(&label, spec, || async move {
                for (idx, template) in templates.iter().enumerate() {
                    if self.is_visible(template).await? {
                        return Ok(Some(idx));
                    }
                }
                Ok(None)
            })
            .await?;
        match matched {
            Some(idx) => info!(matched = %templates[idx].name(), "Alternative marker visible"),
            None => info!(markers = %label, "No alternative marker visible"),
        }
        Ok(matched)
    }

    /// The shared poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl std::fmt::Debug for ImageMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageMatcher")
            .field("tolerance", &self.tolerance)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::testing::FakeDevice;
    use tokio::time::Instant;

    fn matcher(device: &Arc<FakeDevice>) -> ImageMatcher {
        ImageMatcher::new(
            device.clone(),
            PollingWaiter::new(Arc::new(CancellationToken::new())),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_visible_is_idempotent_on_static_screen() {
        let device = Arc::new(FakeDevice::new());
        let logo = TemplateImage::from_bytes("logo", b"logo");
        device.show("logo", Rect::new(0, 0, 10, 10));
        let matcher = matcher(&device);

        assert!(matcher.is_visible(&logo).await.unwrap());
        assert!(matcher.is_visible(&logo).await.unwrap());

        let hidden = TemplateImage::from_bytes("menu", b"menu");
        assert!(!matcher.is_visible(&hidden).await.unwrap());
        assert!(!matcher.is_visible(&hidden).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_implicit_wait_restored_after_hit_miss_and_failure() {
        let device = Arc::new(FakeDevice::new());
        device.set_initial_implicit_wait(Duration::from_secs(5));
        let logo = TemplateImage::from_bytes("logo", b"logo");
        let matcher = matcher(&device);

        assert!(!matcher.is_visible(&logo).await.unwrap());
        device.show("logo", Rect::new(0, 0, 10, 10));
        assert!(matcher.is_visible(&logo).await.unwrap());
        device.fail_on("find_image", "session crashed");
        assert!(matcher.is_visible(&logo).await.is_err());

        assert_eq!(device.current_implicit_wait(), Duration::from_secs(5));
        assert_eq!(
            device.implicit_wait_history(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(1),
                Duration::from_secs(5),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_locate_center_waits_for_late_template() {
        let device = Arc::new(FakeDevice::new());
        device.show_after("exit", Rect::new(100, 100, 40, 20), Duration::from_secs(4));
        let exit = TemplateImage::from_bytes("exit", b"exit");
        let start = Instant::now();

        let center = matcher(&device)
            .locate_center(&exit, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(center, Some(Point::new(120, 110)));
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_any_visible_reports_matched_alternative() {
        let device = Arc::new(FakeDevice::new());
        let marker = TemplateImage::from_bytes("marker", b"marker");
        let logo = TemplateImage::from_bytes("logo", b"logo");
        device.show_after("logo", Rect::new(0, 0, 10, 10), Duration::from_secs(2));

        let spec = WaitSpec::from_secs(15, 1).unwrap();
        let matched = matcher(&device)
            .wait_any_visible(&[&marker, &logo], spec)
            .await
            .unwrap();
        assert_eq!(matched, Some(1));
    }
}
