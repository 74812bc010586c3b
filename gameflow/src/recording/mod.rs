//! Result recording.
//!
//! This module provides:
//! - [`EvidenceStore`] and [`EvidenceCamera`] for screenshots
//! - [`ResultSink`] with the Google Sheets and JSON-lines implementations
//! - [`ResultRecorder`], which ties the two together per outcome

mod cell;
mod evidence;
mod recorder;
mod sheets;
mod sink;

pub use cell::CellAddress;
pub use evidence::{EvidenceCamera, EvidenceRecord, EvidenceStore, FsEvidenceStore};
pub use recorder::{RecordedResult, ResultRecorder};
pub use sheets::GoogleSheetsSink;
pub use sink::{JsonlResultSink, ResultSink};
