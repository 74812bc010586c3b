//! Stage outcome type with factory methods.

use super::Verdict;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The outcome of one executed stage.
///
/// `StageOutcome` is immutable once created. Use the factory methods to
/// create outcomes with a given verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The verdict of the stage.
    pub verdict: Verdict,

    /// Human-readable reason (for failed or blocked stages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Screenshot captured for this outcome, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<PathBuf>,
}

impl StageOutcome {
    /// Creates a passing outcome.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            verdict: Verdict::Pass,
            reason: None,
            evidence: None,
        }
    }

    /// Creates a failing outcome with a reason.
    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Fail,
            reason: Some(reason.into()),
            evidence: None,
        }
    }

    /// Creates a blocked outcome with a reason.
    #[must_use]
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Block,
            reason: Some(reason.into()),
            evidence: None,
        }
    }

    /// Attaches an evidence reference.
    #[must_use]
    pub fn with_evidence(mut self, path: impl Into<PathBuf>) -> Self {
        self.evidence = Some(path.into());
        self
    }

    /// Returns the reason, or an empty string.
    #[must_use]
    pub fn reason_or_empty(&self) -> &str {
        self.reason.as_deref().unwrap_or("")
    }

    /// Returns the evidence path, if any.
    #[must_use]
    pub fn evidence(&self) -> Option<&Path> {
        self.evidence.as_deref()
    }

    /// One-line summary used in logs.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{}: {reason}", self.verdict),
            None => self.verdict.to_string(),
        }
    }
}
