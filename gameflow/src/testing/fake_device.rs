//! Scripted in-memory device.

use crate::core::{AppState, Point, Rect, ScreenSize};
use crate::errors::{FlowError, TransportError};
use crate::transport::{DeviceSession, NativeElement, NativeSelector, PointerAction, PointerSequence};
use crate::vision::{Marker, TemplateImage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Appearance {
    rect: Rect,
    from: Duration,
    until: Option<Duration>,
}

impl Appearance {
    fn covers(&self, elapsed: Duration) -> bool {
        elapsed >= self.from && self.until.map_or(true, |until| elapsed < until)
    }
}

#[derive(Debug, Clone)]
struct FakeNative {
    text: String,
    from: Duration,
    enabled: bool,
}

#[derive(Debug)]
struct FakeState {
    screen: ScreenSize,
    images: HashMap<String, Vec<Appearance>>,
    natives: HashMap<String, FakeNative>,
    scripted_states: VecDeque<AppState>,
    app_state: AppState,
    current_package: Option<String>,
    performed: Vec<PointerSequence>,
    implicit_wait: Duration,
    implicit_history: Vec<Duration>,
    failures: HashMap<String, String>,
    calls: Vec<String>,
    clicked: Vec<String>,
    activated: Vec<String>,
    cleared: Vec<String>,
    back_presses: usize,
    screenshots: usize,
    quit: bool,
}

/// A [`DeviceSession`] driven by a script instead of a phone.
///
/// Visibility is scripted against time elapsed since the device was
/// created, measured on the tokio clock, so tests with a paused clock see
/// markers appear at exact instants. Lookups answer immediately; the
/// implicit wait is recorded but not simulated.
#[derive(Debug)]
pub struct FakeDevice {
    origin: Instant,
    state: Mutex<FakeState>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDevice {
    /// Creates a 1080x2400 device with nothing on screen and the app not running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(FakeState {
                screen: ScreenSize::new(1080, 2400),
                images: HashMap::new(),
                natives: HashMap::new(),
                scripted_states: VecDeque::new(),
                app_state: AppState::NotRunning,
                current_package: None,
                performed: Vec::new(),
                implicit_wait: Duration::ZERO,
                implicit_history: Vec::new(),
                failures: HashMap::new(),
                calls: Vec::new(),
                clicked: Vec::new(),
                activated: Vec::new(),
                cleared: Vec::new(),
                back_presses: 0,
                screenshots: 0,
                quit: false,
            }),
        }
    }

    /// Time since the device was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Instant::now().duration_since(self.origin)
    }

    /// Sets the reported screen size.
    pub fn set_screen_size(&self, size: ScreenSize) {
        self.state.lock().screen = size;
    }

    /// Shows the template named `name` from now on.
    pub fn show(&self, name: &str, rect: Rect) {
        self.show_between(name, rect, Duration::ZERO, None);
    }

    /// Shows the template named `name` once `delay` has passed since creation.
    pub fn show_after(&self, name: &str, rect: Rect, delay: Duration) {
        self.show_between(name, rect, delay, None);
    }

    /// Shows a template during `[from, until)` since creation.
    pub fn show_between(&self, name: &str, rect: Rect, from: Duration, until: Option<Duration>) {
        self.state
            .lock()
            .images
            .entry(name.to_string())
            .or_default()
            .push(Appearance { rect, from, until });
    }

    /// Shows a marker from now on.
    pub fn show_marker(&self, marker: Marker, rect: Rect) {
        self.show(marker.stem(), rect);
    }

    /// Shows a marker once `delay` has passed since creation.
    pub fn show_marker_after(&self, marker: Marker, rect: Rect, delay: Duration) {
        self.show_after(marker.stem(), rect, delay);
    }

    /// Removes every scripted appearance of a template.
    pub fn hide(&self, name: &str) {
        self.state.lock().images.remove(name);
    }

    /// Adds a native element, visible once `delay` has passed since creation.
    pub fn add_native(&self, selector: &NativeSelector, text: &str, delay: Duration, enabled: bool) {
        let (_, key) = selector.to_locator();
        self.state.lock().natives.insert(
            key,
            FakeNative {
                text: text.to_string(),
                from: delay,
                enabled,
            },
        );
    }

    /// Queues app states returned by `query_app_state`, oldest first.
    ///
    /// The last queued state repeats once the queue is drained.
    pub fn script_app_states(&self, states: impl IntoIterator<Item = AppState>) {
        self.state.lock().scripted_states.extend(states);
    }

    /// Sets the app state directly.
    pub fn set_app_state(&self, app_state: AppState) {
        self.state.lock().app_state = app_state;
    }

    /// Sets the foreground package directly.
    pub fn set_current_package(&self, package: Option<&str>) {
        self.state.lock().current_package = package.map(str::to_string);
    }

    /// Makes every call to `op` fail with a protocol error.
    pub fn fail_on(&self, op: &str, message: &str) {
        self.state
            .lock()
            .failures
            .insert(op.to_string(), message.to_string());
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, op: &str) {
        self.state.lock().failures.remove(op);
    }

    /// Sets the implicit wait without recording it.
    pub fn set_initial_implicit_wait(&self, wait: Duration) {
        self.state.lock().implicit_wait = wait;
    }

    /// Current implicit wait.
    #[must_use]
    pub fn current_implicit_wait(&self) -> Duration {
        self.state.lock().implicit_wait
    }

    /// Every value passed to `set_implicit_wait`.
    #[must_use]
    pub fn implicit_wait_history(&self) -> Vec<Duration> {
        self.state.lock().implicit_history.clone()
    }

    /// Every dispatched pointer sequence.
    #[must_use]
    pub fn performed(&self) -> Vec<PointerSequence> {
        self.state.lock().performed.clone()
    }

    /// Points of dispatched taps (sequences holding a pause).
    #[must_use]
    pub fn taps(&self) -> Vec<Point> {
        self.state
            .lock()
            .performed
            .iter()
            .filter(|s| s.actions().iter().any(|a| matches!(a, PointerAction::Pause(_))))
            .filter_map(PointerSequence::start)
            .collect()
    }

    /// Start and end points of dispatched drags.
    #[must_use]
    pub fn drags(&self) -> Vec<(Point, Point)> {
        self.state
            .lock()
            .performed
            .iter()
            .filter(|s| {
                s.actions()
                    .iter()
                    .any(|a| matches!(a, PointerAction::Move { duration_ms, .. } if *duration_ms > 0))
            })
            .filter_map(|s| Some((s.start()?, s.end()?)))
            .collect()
    }

    /// Names of every call made, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Number of calls to `op`.
    #[must_use]
    pub fn count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == op).count()
    }

    /// Ids of clicked native elements.
    #[must_use]
    pub fn clicked(&self) -> Vec<String> {
        self.state.lock().clicked.clone()
    }

    /// Packages passed to `activate_app`.
    #[must_use]
    pub fn activated(&self) -> Vec<String> {
        self.state.lock().activated.clone()
    }

    /// Packages passed to `clear_app_data`.
    #[must_use]
    pub fn cleared(&self) -> Vec<String> {
        self.state.lock().cleared.clone()
    }

    /// Number of back presses.
    #[must_use]
    pub fn back_presses(&self) -> usize {
        self.state.lock().back_presses
    }

    /// Number of screenshots taken.
    #[must_use]
    pub fn screenshot_count(&self) -> usize {
        self.state.lock().screenshots
    }

    /// Returns true once `quit` was called.
    #[must_use]
    pub fn is_quit(&self) -> bool {
        self.state.lock().quit
    }

    /// Logs the call and applies closed-session and injected failures.
    fn enter(&self, op: &str) -> Result<parking_lot::MutexGuard<'_, FakeState>, FlowError> {
        let mut state = self.state.lock();
        state.calls.push(op.to_string());
        if state.quit && op != "quit" {
            return Err(TransportError::SessionClosed.into());
        }
        if let Some(message) = state.failures.get(op) {
            return Err(TransportError::protocol("unknown error", message.clone()).into());
        }
        Ok(state)
    }
}

#[async_trait]
impl DeviceSession for FakeDevice {
    async fn activate_app(&self, package: &str) -> Result<(), FlowError> {
        let mut state = self.enter("activate_app")?;
        state.activated.push(package.to_string());
        state.app_state = AppState::Foreground;
        state.current_package = Some(package.to_string());
        Ok(())
    }

    async fn clear_app_data(&self, package: &str) -> Result<(), FlowError> {
        let mut state = self.enter("clear_app_data")?;
        state.cleared.push(package.to_string());
        state.app_state = AppState::NotRunning;
        state.current_package = None;
        Ok(())
    }

    async fn current_package(&self) -> Result<Option<String>, FlowError> {
        Ok(self.enter("current_package")?.current_package.clone())
    }

    async fn query_app_state(&self, _package: &str) -> Result<AppState, FlowError> {
        let mut state = self.enter("query_app_state")?;
        if state.scripted_states.len() > 1 {
            if let Some(next) = state.scripted_states.pop_front() {
                return Ok(next);
            }
        }
        Ok(state
            .scripted_states
            .front()
            .copied()
            .unwrap_or(state.app_state))
    }

    async fn perform(&self, sequence: &PointerSequence) -> Result<(), FlowError> {
        self.enter("perform")?.performed.push(sequence.clone());
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, FlowError> {
        let mut state = self.enter("screenshot")?;
        state.screenshots += 1;
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&state.screenshots.to_be_bytes());
        Ok(png)
    }

    async fn screen_size(&self) -> Result<ScreenSize, FlowError> {
        Ok(self.enter("screen_size")?.screen)
    }

    async fn back(&self) -> Result<(), FlowError> {
        self.enter("back")?.back_presses += 1;
        Ok(())
    }

    async fn quit(&self) -> Result<(), FlowError> {
        let mut state = self.state.lock();
        state.calls.push("quit".to_string());
        state.quit = true;
        if let Some(message) = state.failures.get("quit") {
            return Err(TransportError::protocol("unknown error", message.clone()).into());
        }
        Ok(())
    }

    async fn implicit_wait(&self) -> Result<Duration, FlowError> {
        Ok(self.enter("implicit_wait")?.implicit_wait)
    }

    async fn set_implicit_wait(&self, wait: Duration) -> Result<(), FlowError> {
        let mut state = self.enter("set_implicit_wait")?;
        state.implicit_wait = wait;
        state.implicit_history.push(wait);
        Ok(())
    }

    async fn find_image(&self, template: &TemplateImage) -> Result<Rect, FlowError> {
        let elapsed = self.elapsed();
        let state = self.enter("find_image")?;
        state
            .images
            .get(template.name())
            .and_then(|appearances| appearances.iter().find(|a| a.covers(elapsed)))
            .map(|a| a.rect)
            .ok_or_else(|| TransportError::NoSuchElement(template.name().to_string()).into())
    }

    async fn find_native(&self, selector: &NativeSelector) -> Result<NativeElement, FlowError> {
        let elapsed = self.elapsed();
        let state = self.enter("find_native")?;
        let (_, key) = selector.to_locator();
        match state.natives.get(&key) {
            Some(native) if elapsed >= native.from => Ok(NativeElement::new(key)),
            _ => Err(TransportError::NoSuchElement(selector.to_string()).into()),
        }
    }

    async fn find_all_native(
        &self,
        selector: &NativeSelector,
    ) -> Result<Vec<NativeElement>, FlowError> {
        let elapsed = self.elapsed();
        let state = self.enter("find_all_native")?;
        let (_, key) = selector.to_locator();
        let wants_emails = key.contains("contains(@text, '@')");
        let mut found: Vec<NativeElement> = state
            .natives
            .iter()
            .filter(|(id, native)| {
                elapsed >= native.from && (**id == key || (wants_emails && native.text.contains('@')))
            })
            .map(|(id, _)| NativeElement::new(id.clone()))
            .collect();
        found.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(found)
    }

    async fn click_native(&self, element: &NativeElement) -> Result<(), FlowError> {
        let mut state = self.enter("click_native")?;
        if !state.natives.contains_key(element.id()) {
            return Err(TransportError::NoSuchElement(element.id().to_string()).into());
        }
        state.clicked.push(element.id().to_string());
        Ok(())
    }

    async fn element_text(&self, element: &NativeElement) -> Result<String, FlowError> {
        let state = self.enter("element_text")?;
        state
            .natives
            .get(element.id())
            .map(|n| n.text.clone())
            .ok_or_else(|| TransportError::NoSuchElement(element.id().to_string()).into())
    }

    async fn element_enabled(&self, element: &NativeElement) -> Result<bool, FlowError> {
        let state = self.enter("element_enabled")?;
        state
            .natives
            .get(element.id())
            .map(|n| n.enabled)
            .ok_or_else(|| TransportError::NoSuchElement(element.id().to_string()).into())
    }
}
