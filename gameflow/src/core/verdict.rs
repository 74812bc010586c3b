//! Stage verdict and app-state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The recorded result of one stage or test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The stage ran and its verification held.
    Pass,
    /// The stage ran and its action or verification failed.
    Fail,
    /// The stage was not meaningfully attempted because a prerequisite did not hold.
    Block,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "Pass"),
            Self::Fail => write!(f, "Fail"),
            Self::Block => write!(f, "Block"),
        }
    }
}

impl Verdict {
    /// Returns true if the verdict indicates success.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Returns true if the stage was tested and broken.
    #[must_use]
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail)
    }

    /// Returns true if the stage was never meaningfully attempted.
    #[must_use]
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block)
    }

    /// The sheet value written for this verdict.
    #[must_use]
    pub fn as_sheet_value(&self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::Block => "Block",
        }
    }
}

/// Lifecycle state of the app under test, as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// The app is not installed on the device.
    NotInstalled,
    /// The app is installed but not running.
    NotRunning,
    /// The app is running in the background.
    Background,
    /// The app is running in the foreground.
    Foreground,
}

impl AppState {
    /// Maps the UiAutomator2 `queryAppState` integer.
    ///
    /// `2` (background, suspended) and `3` (background) both map to
    /// [`AppState::Background`].
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::NotInstalled),
            1 => Some(Self::NotRunning),
            2 | 3 => Some(Self::Background),
            4 => Some(Self::Foreground),
            _ => None,
        }
    }

    /// Returns true if the app is in the foreground.
    #[must_use]
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled => write!(f, "not_installed"),
            Self::NotRunning => write!(f, "not_running"),
            Self::Background => write!(f, "background"),
            Self::Foreground => write!(f, "foreground"),
        }
    }
}
