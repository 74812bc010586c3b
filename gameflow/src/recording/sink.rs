//! Result sink trait and the JSON-lines sink.

use super::CellAddress;
use crate::errors::FlowError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Accepts one verdict string per result cell.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Writes `value` into `cell`, replacing what was there.
    async fn write_cell(&self, cell: &CellAddress, value: &str) -> Result<(), FlowError>;
}

#[derive(Serialize)]
struct JsonlEntry<'a> {
    range: String,
    value: &'a str,
    recorded_at: String,
}

/// Appends one JSON object per write to a local file.
///
/// Used for dry runs when no spreadsheet is configured.
#[derive(Debug, Clone)]
pub struct JsonlResultSink {
    path: PathBuf,
}

impl JsonlResultSink {
    /// Creates a sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultSink for JsonlResultSink {
    async fn write_cell(&self, cell: &CellAddress, value: &str) -> Result<(), FlowError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let entry = JsonlEntry {
            range: cell.range(),
            value,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        };
        let mut line =
            serde_json::to_string(&entry).map_err(|e| FlowError::Sink(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(range = %entry.range, value = %value, "Result appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results/run.jsonl");
        let sink = JsonlResultSink::new(&path);

        sink.write_cell(&CellAddress::new("Checklist", "F", 4), "Pass")
            .await
            .unwrap();
        sink.write_cell(&CellAddress::new("Checklist", "F", 5), "Block")
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["range"], "Checklist!F4");
        assert_eq!(lines[1]["value"], "Block");
    }
}
