//! Spreadsheet cell addressing.

use crate::config::RecordingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One result cell, addressed in A1 notation.
///
/// The row is `header_row_offset + index`, so with the default offset of 3
/// test case 1 lands on row 4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    /// Sheet (tab) name.
    pub sheet: String,
    /// Column letters.
    pub column: String,
    /// 1-based row.
    pub row: u32,
}

impl CellAddress {
    /// Creates an address.
    #[must_use]
    pub fn new(sheet: impl Into<String>, column: impl Into<String>, row: u32) -> Self {
        Self {
            sheet: sheet.into(),
            column: column.into(),
            row,
        }
    }

    /// The result cell for a test-case index.
    #[must_use]
    pub fn for_index(recording: &RecordingConfig, index: u32) -> Self {
        Self::new(
            recording.sheet_name.clone(),
            recording.result_column.clone(),
            recording.header_row_offset + index,
        )
    }

    /// Cell reference without the sheet, e.g. `F4`.
    #[must_use]
    pub fn a1(&self) -> String {
        format!("{}{}", self.column, self.row)
    }

    /// Range including the sheet, e.g. `Checklist!F4`.
    ///
    /// Sheet names that are not plain identifiers are quoted.
    #[must_use]
    pub fn range(&self) -> String {
        let plain = self
            .sheet
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            format!("{}!{}", self.sheet, self.a1())
        } else {
            format!("'{}'!{}", self.sheet.replace('\'', "''"), self.a1())
        }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_follow_header_offset() {
        let recording = RecordingConfig::default();
        assert_eq!(CellAddress::for_index(&recording, 1).a1(), "F4");
        assert_eq!(CellAddress::for_index(&recording, 4).a1(), "F7");
    }

    #[test]
    fn test_range_includes_sheet() {
        let cell = CellAddress::new("Checklist", "F", 4);
        assert_eq!(cell.range(), "Checklist!F4");
        assert_eq!(cell.to_string(), "Checklist!F4");
    }

    #[test]
    fn test_range_quotes_sheet_with_spaces() {
        let cell = CellAddress::new("Smoke Run's", "G", 9);
        assert_eq!(cell.range(), "'Smoke Run''s'!G9");
    }
}
