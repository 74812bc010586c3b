//! Device session transport.
//!
//! [`DeviceSession`] is the seam between flows and the device. The
//! production implementation is [`AppiumSession`], a W3C WebDriver client
//! speaking the Appium UiAutomator2 dialect. Tests use
//! [`crate::testing::FakeDevice`].

mod actions;
mod appium;
mod implicit_wait;

pub use actions::{PointerAction, PointerSequence};
pub use appium::{AppiumSession, AppiumSessionFactory};
pub use implicit_wait::with_implicit_wait;

use crate::config::FlowConfig;
use crate::core::{AppState, Rect, ScreenSize};
use crate::errors::FlowError;
use crate::vision::TemplateImage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Locator for a native Android view outside the game surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeSelector {
    /// Resource id.
    Id(String),
    /// Raw XPath.
    XPath(String),
    /// `android.widget.TextView` whose text equals the value.
    ExactText(String),
}

impl NativeSelector {
    /// W3C locator strategy and value.
    #[must_use]
    pub fn to_locator(&self) -> (&'static str, String) {
        match self {
            Self::Id(id) => ("id", id.clone()),
            Self::XPath(xpath) => ("xpath", xpath.clone()),
            Self::ExactText(text) => (
                "xpath",
                format!("//android.widget.TextView[@text={}]", xpath_literal(text)),
            ),
        }
    }
}

/// Quotes `text` as an XPath 1.0 string literal.
///
/// XPath has no escape sequence, so text holding both quote kinds is split
/// at each apostrophe and rebuilt with `concat()`.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts: Vec<String> = text.split('\'').map(|part| format!("'{part}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

impl std::fmt::Display for NativeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (using, value) = self.to_locator();
        write!(f, "{using}={value}")
    }
}

/// Handle to a native element found by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeElement {
    id: String,
}

impl NativeElement {
    /// Wraps a server element id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The server element id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Remote control of one device session.
///
/// Lookups that find nothing return a `no such element` transport error,
/// which [`FlowError::is_not_yet_ready`] classifies as a miss.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Brings the app to the foreground, launching it if needed.
    async fn activate_app(&self, package: &str) -> Result<(), FlowError>;

    /// Clears the app's data (full reset to first-launch state).
    async fn clear_app_data(&self, package: &str) -> Result<(), FlowError>;

    /// Package currently in the foreground.
    async fn current_package(&self) -> Result<Option<String>, FlowError>;

    /// Lifecycle state of the app.
    async fn query_app_state(&self, package: &str) -> Result<AppState, FlowError>;

    /// Dispatches a pointer sequence.
    async fn perform(&self, sequence: &PointerSequence) -> Result<(), FlowError>;

    /// PNG screenshot bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, FlowError>;

    /// Current window size.
    async fn screen_size(&self) -> Result<ScreenSize, FlowError>;

    /// Presses the system back button.
    async fn back(&self) -> Result<(), FlowError>;

    /// Ends the session. Calling it twice is harmless.
    async fn quit(&self) -> Result<(), FlowError>;

    /// Current implicit wait.
    async fn implicit_wait(&self) -> Result<Duration, FlowError>;

    /// Sets the implicit wait.
    async fn set_implicit_wait(&self, wait: Duration) -> Result<(), FlowError>;

    /// Rectangle of the best on-screen match of a template image.
    async fn find_image(&self, template: &TemplateImage) -> Result<Rect, FlowError>;

    /// First native element matching `selector`.
    async fn find_native(&self, selector: &NativeSelector) -> Result<NativeElement, FlowError>;

    /// Every native element matching `selector`. Empty when none match.
    async fn find_all_native(
        &self,
        selector: &NativeSelector,
    ) -> Result<Vec<NativeElement>, FlowError>;

    /// Clicks a native element.
    async fn click_native(&self, element: &NativeElement) -> Result<(), FlowError>;

    /// Visible text of a native element.
    async fn element_text(&self, element: &NativeElement) -> Result<String, FlowError>;

    /// Whether a native element is enabled.
    async fn element_enabled(&self, element: &NativeElement) -> Result<bool, FlowError>;
}

/// Opens device sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Connects a new session for the configured app.
    async fn connect(&self, config: &FlowConfig) -> Result<Arc<dyn DeviceSession>, FlowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_text_selector_builds_xpath() {
        let selector = NativeSelector::ExactText("tester@example.com".into());
        assert_eq!(
            selector.to_locator(),
            (
                "xpath",
                "//android.widget.TextView[@text='tester@example.com']".to_string()
            )
        );
    }

    #[test]
    fn test_exact_text_with_apostrophe_stays_balanced() {
        let selector = NativeSelector::ExactText("o'brien@example.com".into());
        let (_, xpath) = selector.to_locator();
        assert_eq!(
            xpath,
            "//android.widget.TextView[@text=\"o'brien@example.com\"]"
        );
    }

    #[test]
    fn test_exact_text_with_both_quotes_uses_concat() {
        let selector = NativeSelector::ExactText(r#"o'brien"x"@example.com"#.into());
        let (_, xpath) = selector.to_locator();
        assert_eq!(
            xpath,
            r#"//android.widget.TextView[@text=concat('o', "'", 'brien"x"@example.com')]"#
        );
    }

    #[test]
    fn test_selector_display() {
        let selector = NativeSelector::Id("android:id/button1".into());
        assert_eq!(selector.to_string(), "id=android:id/button1");
    }
}
