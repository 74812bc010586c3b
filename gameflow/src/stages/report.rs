//! Sequencer report.

use crate::core::{StageOutcome, Verdict};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage index (`first_index + position`).
    pub index: u32,
    /// Stage name.
    pub name: String,
    /// Outcome.
    pub outcome: StageOutcome,
    /// Time spent in the stage.
    pub elapsed: Duration,
}

/// Everything one sequencer run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Flow name.
    pub flow: String,
    /// Executed stages in order.
    pub records: Vec<StageRecord>,
    /// Stages left unattempted after a failure or block.
    pub not_run: Vec<String>,
}

impl SequenceReport {
    /// Returns true if every stage ran and passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.not_run.is_empty() && self.records.iter().all(|r| r.outcome.verdict.is_pass())
    }

    /// The first stage that did not pass.
    #[must_use]
    pub fn first_non_pass(&self) -> Option<&StageRecord> {
        self.records.iter().find(|r| !r.outcome.verdict.is_pass())
    }

    /// Outcome of a stage by name.
    #[must_use]
    pub fn outcome_of(&self, stage: &str) -> Option<&StageOutcome> {
        self.records
            .iter()
            .find(|r| r.name == stage)
            .map(|r| &r.outcome)
    }

    /// Folds the run into one outcome: Block if any stage blocked, else Fail
    /// if any failed, else Pass.
    #[must_use]
    pub fn aggregate(&self) -> StageOutcome {
        let worst = self
            .records
            .iter()
            .find(|r| r.outcome.verdict.is_block())
            .or_else(|| self.records.iter().find(|r| r.outcome.verdict.is_fail()));

        match worst {
            None => StageOutcome::pass(),
            Some(record) => {
                let reason = format!("{}: {}", record.name, record.outcome.reason_or_empty());
                let mut outcome = match record.outcome.verdict {
                    Verdict::Block => StageOutcome::block(reason),
                    _ => StageOutcome::fail(reason),
                };
                outcome.evidence.clone_from(&record.outcome.evidence);
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: u32, name: &str, outcome: StageOutcome) -> StageRecord {
        StageRecord {
            index,
            name: name.into(),
            outcome,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_all_pass_aggregates_to_pass() {
        let report = SequenceReport {
            flow: "f".into(),
            records: vec![record(1, "A", StageOutcome::pass())],
            not_run: vec![],
        };
        assert!(report.passed());
        assert_eq!(report.aggregate(), StageOutcome::pass());
    }

    #[test]
    fn test_fail_aggregates_with_stage_name() {
        let report = SequenceReport {
            flow: "f".into(),
            records: vec![
                record(1, "A", StageOutcome::pass()),
                record(2, "B", StageOutcome::fail("no marker").with_evidence("b.png")),
            ],
            not_run: vec!["C".into()],
        };
        assert!(!report.passed());
        let aggregate = report.aggregate();
        assert_eq!(aggregate.verdict, Verdict::Fail);
        assert_eq!(aggregate.reason.as_deref(), Some("B: no marker"));
        assert_eq!(aggregate.evidence(), Some(std::path::Path::new("b.png")));
    }

    #[test]
    fn test_first_non_pass_is_the_stopping_stage() {
        let report = SequenceReport {
            flow: "logout".into(),
            records: vec![
                record(1, "verify_lobby", StageOutcome::pass()),
                record(2, "tap_menu", StageOutcome::fail("menu_button not found")),
            ],
            not_run: vec!["verify_menu_popup".into()],
        };
        assert_eq!(report.first_non_pass().map(|r| r.name.as_str()), Some("tap_menu"));

        let clean = SequenceReport {
            flow: "logout".into(),
            records: vec![record(1, "verify_lobby", StageOutcome::pass())],
            not_run: vec![],
        };
        assert!(clean.first_non_pass().is_none());
    }

    #[test]
    fn test_block_wins_over_fail() {
        let report = SequenceReport {
            flow: "f".into(),
            records: vec![
                record(1, "A", StageOutcome::fail("x")),
                record(2, "B", StageOutcome::block("y")),
            ],
            not_run: vec![],
        };
        assert_eq!(report.aggregate().verdict, Verdict::Block);
    }

    #[test]
    fn test_unrun_stages_mean_not_passed() {
        let report = SequenceReport {
            flow: "f".into(),
            records: vec![],
            not_run: vec!["A".into()],
        };
        assert!(!report.passed());
    }
}
