//! Run configuration.
//!
//! One [`FlowConfig`] is loaded, overridden from the environment, validated
//! once and then shared behind an `Arc` by every component. All fields have
//! defaults so an empty JSON object is a valid file.

mod wait;

pub use wait::{DownloadWait, WaitSpec};

use crate::errors::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`AppiumConfig::server_url`].
pub const ENV_APPIUM_URL: &str = "GAMEFLOW_APPIUM_URL";

/// Environment variable overriding [`RecordingConfig::access_token`].
pub const ENV_SHEETS_TOKEN: &str = "GAMEFLOW_SHEETS_TOKEN";

/// Complete configuration for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Appium server and app identity.
    #[serde(default)]
    pub appium: AppiumConfig,
    /// Wait bounds for visual checks.
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Fixed pauses after interactions.
    #[serde(default)]
    pub settle: SettleDelays,
    /// Download detector bounds.
    #[serde(default)]
    pub download: DownloadConfig,
    /// Gesture tuning.
    #[serde(default)]
    pub gestures: GestureConfig,
    /// Result sheet target.
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Evidence output.
    #[serde(default)]
    pub evidence: EvidenceConfig,
    /// Template image location.
    #[serde(default)]
    pub assets: AssetConfig,
    /// Native selectors outside the game surface.
    #[serde(default)]
    pub selectors: SelectorConfig,
    /// Login account.
    #[serde(default)]
    pub account: AccountConfig,
    /// Sheet indices of the single-flow test cases.
    #[serde(default)]
    pub test_cases: TestCaseNumbers,
}

impl FlowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Applies the process environment overrides.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup.
    #[must_use]
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_APPIUM_URL).filter(|v| !v.is_empty()) {
            self.appium.server_url = url;
        }
        if let Some(token) = lookup(ENV_SHEETS_TOKEN).filter(|v| !v.is_empty()) {
            self.recording.access_token = Some(token);
        }
        self
    }

    /// Checks every cross-field invariant.
    ///
    /// Every wait bound derived from this configuration is constructible
    /// once this returns `Ok`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.appium.server_url.trim().is_empty() {
            return Err(ConfigError::Empty("appium.server_url".into()));
        }
        if self.appium.app_package.trim().is_empty() {
            return Err(ConfigError::Empty("appium.app_package".into()));
        }
        if self.timeouts.visibility_tolerance_seconds == 0 {
            return Err(ConfigError::ZeroDuration(
                "timeouts.visibility_tolerance_seconds".into(),
            ));
        }
        for timeout in self.timeouts.polled() {
            self.timeouts.wait_spec(timeout)?;
        }
        self.download.to_wait()?;
        self.gestures.validate()?;
        self.recording.validate()?;
        Ok(())
    }

    /// Loads, overrides and validates in one step.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?.apply_env();
        config.validate()?;
        Ok(config)
    }
}

/// Appium server and app identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppiumConfig {
    /// Server base URL.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Android package of the game.
    #[serde(default = "default_app_package")]
    pub app_package: String,
    /// Launch activity.
    #[serde(default = "default_app_activity")]
    pub app_activity: String,
    /// `appium:deviceName` capability.
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// `appium:automationName` capability.
    #[serde(default = "default_automation_name")]
    pub automation_name: String,
    /// `appium:noReset` capability.
    #[serde(default = "default_no_reset")]
    pub no_reset: bool,
    /// `appium:newCommandTimeout` in seconds.
    #[serde(default = "default_new_command_timeout")]
    pub new_command_timeout_seconds: u64,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:4723".to_string()
}

fn default_app_package() -> String {
    "com.epidgames.trickcalrevive".to_string()
}

fn default_app_activity() -> String {
    "com.google.firebase.MessagingUnityPlayerActivity".to_string()
}

fn default_device_name() -> String {
    "Android".to_string()
}

fn default_automation_name() -> String {
    "UiAutomator2".to_string()
}

fn default_no_reset() -> bool {
    true
}

fn default_new_command_timeout() -> u64 {
    1800
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for AppiumConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            app_package: default_app_package(),
            app_activity: default_app_activity(),
            device_name: default_device_name(),
            automation_name: default_automation_name(),
            no_reset: default_no_reset(),
            new_command_timeout_seconds: default_new_command_timeout(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl AppiumConfig {
    /// Gets the request timeout as Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Wait bounds, all in whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Main-screen markers and most button lookups.
    pub main_marker_seconds: u64,
    /// Game-started marker after the cheek drag.
    pub game_start_verify_seconds: u64,
    /// Exit dialog button.
    pub exit_button_seconds: u64,
    /// Logo visibility required before the cheek drag.
    pub drag_precondition_seconds: u64,
    /// Native notification permission dialog (implicit wait).
    pub permission_popup_seconds: u64,
    /// Account chooser entry becoming clickable.
    pub account_selection_seconds: u64,
    /// Lobby logo after login.
    pub login_processing_seconds: u64,
    /// Popups opened from the lobby menu.
    pub popup_transition_seconds: u64,
    /// Terms screen after logout.
    pub logout_verification_seconds: u64,
    /// Ambient implicit wait of the session.
    pub implicit_default_seconds: u64,
    /// Implicit wait used for a single visibility probe.
    pub visibility_tolerance_seconds: u64,
    /// Poll interval shared by every visual wait.
    pub poll_interval_seconds: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            main_marker_seconds: 30,
            game_start_verify_seconds: 15,
            exit_button_seconds: 10,
            drag_precondition_seconds: 10,
            permission_popup_seconds: 5,
            account_selection_seconds: 15,
            login_processing_seconds: 30,
            popup_transition_seconds: 10,
            logout_verification_seconds: 30,
            implicit_default_seconds: 0,
            visibility_tolerance_seconds: 1,
            poll_interval_seconds: 1,
        }
    }
}

impl Timeouts {
    /// Main-marker timeout.
    #[must_use]
    pub fn main_marker(&self) -> Duration {
        Duration::from_secs(self.main_marker_seconds)
    }

    /// Game-start verification timeout.
    #[must_use]
    pub fn game_start_verify(&self) -> Duration {
        Duration::from_secs(self.game_start_verify_seconds)
    }

    /// Exit-button timeout.
    #[must_use]
    pub fn exit_button(&self) -> Duration {
        Duration::from_secs(self.exit_button_seconds)
    }

    /// Drag precondition timeout.
    #[must_use]
    pub fn drag_precondition(&self) -> Duration {
        Duration::from_secs(self.drag_precondition_seconds)
    }

    /// Permission-popup implicit wait.
    #[must_use]
    pub fn permission_popup(&self) -> Duration {
        Duration::from_secs(self.permission_popup_seconds)
    }

    /// Account-selection timeout.
    #[must_use]
    pub fn account_selection(&self) -> Duration {
        Duration::from_secs(self.account_selection_seconds)
    }

    /// Login-processing timeout.
    #[must_use]
    pub fn login_processing(&self) -> Duration {
        Duration::from_secs(self.login_processing_seconds)
    }

    /// Popup-transition timeout.
    #[must_use]
    pub fn popup_transition(&self) -> Duration {
        Duration::from_secs(self.popup_transition_seconds)
    }

    /// Logout-verification timeout.
    #[must_use]
    pub fn logout_verification(&self) -> Duration {
        Duration::from_secs(self.logout_verification_seconds)
    }

    /// Ambient implicit wait.
    #[must_use]
    pub fn implicit_default(&self) -> Duration {
        Duration::from_secs(self.implicit_default_seconds)
    }

    /// Visibility-probe tolerance.
    #[must_use]
    pub fn visibility_tolerance(&self) -> Duration {
        Duration::from_secs(self.visibility_tolerance_seconds)
    }

    /// Shared poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Builds a wait spec for `timeout` with the shared poll interval.
    pub fn wait_spec(&self, timeout: Duration) -> Result<WaitSpec, ConfigError> {
        WaitSpec::new(timeout, self.poll_interval())
    }

    fn polled(&self) -> [Duration; 8] {
        [
            self.main_marker(),
            self.game_start_verify(),
            self.exit_button(),
            self.drag_precondition(),
            self.account_selection(),
            self.login_processing(),
            self.popup_transition(),
            self.logout_verification(),
        ]
    }
}

/// Fixed pauses after interactions, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    /// After clearing app data.
    pub after_clear_ms: u64,
    /// After activating the app (engine load).
    pub after_launch_ms: u64,
    /// When the permission dialog never appeared.
    pub permission_absent_ms: u64,
    /// After allowing the permission (native to game surface switch).
    pub after_permission_ms: u64,
    /// After tapping the download-complete button.
    pub after_download_complete_ms: u64,
    /// After the terms screen appeared.
    pub after_terms_marker_ms: u64,
    /// After agreeing to the terms.
    pub after_terms_agree_ms: u64,
    /// After tapping a login button.
    pub after_login_tap_ms: u64,
    /// After choosing the account.
    pub after_account_select_ms: u64,
    /// After opening the lobby menu.
    pub after_menu_ms: u64,
    /// After opening settings.
    pub after_settings_ms: u64,
    /// After opening the etc tab.
    pub after_etc_ms: u64,
    /// After tapping logout.
    pub after_logout_ms: u64,
    /// After confirming logout.
    pub after_logout_confirm_ms: u64,
    /// After the cheek drag.
    pub after_cheek_drag_ms: u64,
    /// After pressing back.
    pub after_back_ms: u64,
    /// After tapping the exit button, before checking the app state.
    pub exit_verification_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_clear_ms: 3000,
            after_launch_ms: 5000,
            permission_absent_ms: 3000,
            after_permission_ms: 5000,
            after_download_complete_ms: 10_000,
            after_terms_marker_ms: 2000,
            after_terms_agree_ms: 3000,
            after_login_tap_ms: 3000,
            after_account_select_ms: 5000,
            after_menu_ms: 1500,
            after_settings_ms: 1500,
            after_etc_ms: 1000,
            after_logout_ms: 1000,
            after_logout_confirm_ms: 3000,
            after_cheek_drag_ms: 3000,
            after_back_ms: 1500,
            exit_verification_ms: 3000,
        }
    }
}

/// Download detector bounds, all in whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Dwell before the first check.
    #[serde(default = "default_minimum_dwell")]
    pub minimum_dwell_seconds: u64,
    /// Ceiling measured from the start of the dwell.
    #[serde(default = "default_maximum_total")]
    pub maximum_total_seconds: u64,
    /// Pause between checks.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Dwell progress log period.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_seconds: u64,
}

fn default_minimum_dwell() -> u64 {
    270
}

fn default_maximum_total() -> u64 {
    360
}

fn default_check_interval() -> u64 {
    10
}

fn default_progress_interval() -> u64 {
    30
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            minimum_dwell_seconds: default_minimum_dwell(),
            maximum_total_seconds: default_maximum_total(),
            check_interval_seconds: default_check_interval(),
            progress_interval_seconds: default_progress_interval(),
        }
    }
}

impl DownloadConfig {
    /// Converts to validated detector bounds.
    pub fn to_wait(&self) -> Result<DownloadWait, ConfigError> {
        DownloadWait::new(
            Duration::from_secs(self.minimum_dwell_seconds),
            Duration::from_secs(self.maximum_total_seconds),
            Duration::from_secs(self.check_interval_seconds),
            Duration::from_secs(self.progress_interval_seconds),
        )
    }
}

/// Which cheek-drag geometry to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragStyle {
    /// From the screen center leftward.
    #[default]
    Adaptive,
    /// From right of and below the center leftward, clamped to the margin.
    Offset,
}

/// Gesture tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Cheek-drag duration.
    pub drag_duration_ms: u64,
    /// Shortest drag the game reliably registers.
    pub minimum_drag_ms: u64,
    /// Pause between pointer down and up on a tap.
    pub tap_hold_ms: u64,
    /// Edge margin for the offset drag.
    pub margin_px: i64,
    /// Cheek-drag variant.
    pub drag_style: DragStyle,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_duration_ms: 1000,
            minimum_drag_ms: 50,
            tap_hold_ms: 100,
            margin_px: 50,
            drag_style: DragStyle::Adaptive,
        }
    }
}

impl GestureConfig {
    /// Cheek-drag duration.
    #[must_use]
    pub fn drag_duration(&self) -> Duration {
        Duration::from_millis(self.drag_duration_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.drag_duration_ms < self.minimum_drag_ms {
            return Err(ConfigError::DragTooShort {
                actual_ms: self.drag_duration_ms,
                minimum_ms: self.minimum_drag_ms,
            });
        }
        Ok(())
    }
}

/// Result sheet target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Spreadsheet id. Without one only dry-run sinks can be used.
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    /// Sheet (tab) name.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    /// Result column letters.
    #[serde(default = "default_result_column")]
    pub result_column: String,
    /// Rows above the first test case.
    #[serde(default = "default_header_row_offset")]
    pub header_row_offset: u32,
    /// OAuth bearer token for the Sheets API.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    /// Sheets API base URL.
    #[serde(default = "default_sheets_endpoint")]
    pub endpoint: String,
}

fn default_sheet_name() -> String {
    "Checklist".to_string()
}

fn default_result_column() -> String {
    "F".to_string()
}

fn default_header_row_offset() -> u32 {
    3
}

fn default_sheets_endpoint() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            sheet_name: default_sheet_name(),
            result_column: default_result_column(),
            header_row_offset: default_header_row_offset(),
            access_token: None,
            endpoint: default_sheets_endpoint(),
        }
    }
}

impl RecordingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let column = Regex::new("^[A-Z]{1,3}$").map_err(|e| ConfigError::Parse(e.to_string()))?;
        if !column.is_match(&self.result_column) {
            return Err(ConfigError::InvalidColumn(self.result_column.clone()));
        }
        if self.sheet_name.trim().is_empty() {
            return Err(ConfigError::Empty("recording.sheet_name".into()));
        }
        Ok(())
    }
}

/// Evidence output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Directory screenshots are written to.
    #[serde(default = "default_evidence_dir")]
    pub directory: PathBuf,
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("build/reports/evidence")
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            directory: default_evidence_dir(),
        }
    }
}

/// Template image location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Directory holding one PNG per marker.
    #[serde(default = "default_asset_dir")]
    pub directory: PathBuf,
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("assets/images")
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            directory: default_asset_dir(),
        }
    }
}

/// Native selectors outside the game surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Resource id of the notification permission "allow" button.
    #[serde(default = "default_permission_allow_id")]
    pub permission_allow_id: String,
}

fn default_permission_allow_id() -> String {
    "com.android.permissioncontroller:id/permission_allow_button".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            permission_allow_id: default_permission_allow_id(),
        }
    }
}

/// Login account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// E-mail shown in the account chooser.
    #[serde(default)]
    pub email: String,
}

/// Sheet indices of the single-flow test cases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCaseNumbers {
    /// First launch.
    pub first_launch: u32,
    /// First login.
    pub first_login: u32,
    /// Re-login.
    pub re_login: u32,
    /// Logout.
    pub logout: u32,
}

impl Default for TestCaseNumbers {
    fn default() -> Self {
        Self {
            first_launch: 5,
            first_login: 6,
            re_login: 7,
            logout: 8,
        }
    }
}
