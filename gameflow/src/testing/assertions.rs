//! Test assertions for outcomes and reports.

use crate::core::{StageOutcome, Verdict};
use crate::stages::SequenceReport;

/// Asserts that the outcome passed.
pub fn assert_pass(outcome: &StageOutcome) {
    assert_verdict(outcome, Verdict::Pass);
}

/// Asserts that the outcome failed.
pub fn assert_fail(outcome: &StageOutcome) {
    assert_verdict(outcome, Verdict::Fail);
}

/// Asserts that the outcome was blocked.
pub fn assert_block(outcome: &StageOutcome) {
    assert_verdict(outcome, Verdict::Block);
}

/// Asserts that the outcome has the expected verdict.
pub fn assert_verdict(outcome: &StageOutcome, expected: Verdict) {
    assert_eq!(
        outcome.verdict, expected,
        "Expected verdict {:?}, got {:?} ({})",
        expected,
        outcome.verdict,
        outcome.reason_or_empty()
    );
}

/// Asserts the executed stages and their verdicts, in order.
pub fn assert_verdicts(report: &SequenceReport, expected: &[(&str, Verdict)]) {
    let actual: Vec<(&str, Verdict)> = report
        .records
        .iter()
        .map(|r| (r.name.as_str(), r.outcome.verdict))
        .collect();
    assert_eq!(
        actual, expected,
        "Unexpected stage verdicts in flow '{}'",
        report.flow
    );
}

/// Asserts that the outcome reason contains `needle`.
pub fn assert_reason_contains(outcome: &StageOutcome, needle: &str) {
    assert!(
        outcome.reason_or_empty().contains(needle),
        "Expected reason to contain '{}', got '{}'",
        needle,
        outcome.reason_or_empty()
    );
}
