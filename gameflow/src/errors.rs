//! Error types for the gameflow crate.
//!
//! Every catch site in the crate classifies what it caught into one of the
//! [`FlowError`] kinds. The classification drives propagation:
//!
//! | kind                | absorbed by        | surfaces as                               |
//! |---------------------|--------------------|-------------------------------------------|
//! | `NotYetReady`       | `PollingWaiter`    | a miss for that tick                      |
//! | `Timeout`           | `StageSequencer`   | stage `Fail`                              |
//! | `PreconditionUnmet` | `StageSequencer`   | `Block` from a precondition, else `Fail`  |
//! | `Transport`         | nobody             | aborts the flow                           |
//! | `ResourceNotFound`  | nobody             | aborts before connect                     |
//! | `Interrupted`       | nobody             | aborts the flow                           |

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for gameflow operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A lookup missed this tick. Expected and non-terminal.
    #[error("Not yet ready: {0}")]
    NotYetReady(String),

    /// A wait never saw its condition within the bound.
    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout {
        /// What was being waited for.
        what: String,
        /// How long the wait lasted.
        waited: Duration,
    },

    /// A stage prerequisite did not hold.
    #[error("Precondition unmet for stage '{stage}': {reason}")]
    PreconditionUnmet {
        /// The stage whose precondition failed.
        stage: String,
        /// Why the precondition failed.
        reason: String,
    },

    /// The remote session raised an unexpected error.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// A required template or reference asset is missing.
    #[error("Resource not found: {}", path.display())]
    ResourceNotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// A sleep or poll was interrupted by cancellation.
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The result sink rejected a write.
    #[error("Result sink error: {0}")]
    Sink(String),

    /// Evidence could not be captured or persisted.
    #[error("Evidence error: {0}")]
    Evidence(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            waited,
        }
    }

    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PreconditionUnmet {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Creates a resource-not-found error.
    #[must_use]
    pub fn resource_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ResourceNotFound { path: path.into() }
    }

    /// Returns true for a miss that a poll loop should retry.
    #[must_use]
    pub fn is_not_yet_ready(&self) -> bool {
        match self {
            Self::NotYetReady(_) => true,
            Self::Transport(err) => err.is_no_such_element(),
            _ => false,
        }
    }

    /// Returns true if the error must abort the whole flow.
    ///
    /// Non-fatal errors are turned into stage outcomes by the sequencer.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NotYetReady(_)
            | Self::Timeout { .. }
            | Self::PreconditionUnmet { .. }
            | Self::Evidence(_) => false,
            Self::Transport(err) => !err.is_no_such_element(),
            Self::ResourceNotFound { .. }
            | Self::Interrupted(_)
            | Self::Config(_)
            | Self::Sink(_)
            | Self::Io(_) => true,
        }
    }

    /// Short machine-readable name of the kind, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotYetReady(_) => "not_yet_ready",
            Self::Timeout { .. } => "timeout",
            Self::PreconditionUnmet { .. } => "precondition_unmet",
            Self::Transport(_) => "transport",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::Interrupted(_) => "interrupted",
            Self::Config(_) => "config",
            Self::Sink(_) => "sink",
            Self::Evidence(_) => "evidence",
            Self::Io(_) => "io",
        }
    }
}

/// Errors raised by the device/session transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server found no element for the locator.
    #[error("No such element: {0}")]
    NoSuchElement(String),

    /// The server answered with a W3C error payload.
    #[error("WebDriver error '{error}': {message}")]
    Protocol {
        /// The W3C error code (e.g. "invalid session id").
        error: String,
        /// The server message.
        message: String,
    },

    /// The HTTP request itself failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with something we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Screenshot payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The session was already quit.
    #[error("Session closed")]
    SessionClosed,
}

impl TransportError {
    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            error: error.into(),
            message: message.into(),
        }
    }

    /// Returns true if this is a locator miss.
    #[must_use]
    pub fn is_no_such_element(&self) -> bool {
        match self {
            Self::NoSuchElement(_) => true,
            Self::Protocol { error, .. } => error == "no such element",
            _ => false,
        }
    }
}

/// Errors raised while validating configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A poll interval is not shorter than its timeout.
    #[error("Poll interval {interval:?} must be shorter than timeout {timeout:?}")]
    IntervalNotBelowTimeout {
        /// The poll interval.
        interval: Duration,
        /// The timeout.
        timeout: Duration,
    },

    /// A dwell floor is not below its ceiling.
    #[error("Minimum dwell {dwell:?} must be below maximum total {maximum:?}")]
    DwellNotBelowMaximum {
        /// The dwell floor.
        dwell: Duration,
        /// The ceiling.
        maximum: Duration,
    },

    /// A duration that must be positive is zero.
    #[error("'{0}' must be greater than zero")]
    ZeroDuration(String),

    /// A drag is too short to register as a gesture.
    #[error("Drag duration {actual_ms}ms is below the {minimum_ms}ms minimum")]
    DragTooShort {
        /// The configured duration.
        actual_ms: u64,
        /// The minimum accepted duration.
        minimum_ms: u64,
    },

    /// A spreadsheet column is not a valid A1 column.
    #[error("Invalid result column '{0}': expected 1-3 uppercase letters")]
    InvalidColumn(String),

    /// A required field is empty.
    #[error("'{0}' must not be empty")]
    Empty(String),

    /// The configuration file could not be parsed.
    #[error("Could not parse configuration: {0}")]
    Parse(String),
}
