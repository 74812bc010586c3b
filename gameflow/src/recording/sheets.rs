//! Google Sheets result sink.

use super::{CellAddress, ResultSink};
use crate::config::RecordingConfig;
use crate::errors::FlowError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// Writes verdicts with the Sheets `values.update` call.
///
/// Values are sent with `valueInputOption=RAW` so the sheet stores the
/// verdict string verbatim.
#[derive(Debug, Clone)]
pub struct GoogleSheetsSink {
    client: Client,
    endpoint: String,
    spreadsheet_id: String,
    access_token: String,
}

impl GoogleSheetsSink {
    /// Creates a sink for a spreadsheet.
    pub fn new(
        endpoint: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, FlowError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FlowError::Sink(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
        })
    }

    /// Creates a sink from the recording section.
    ///
    /// Fails when the spreadsheet id or access token is missing.
    pub fn from_config(recording: &RecordingConfig) -> Result<Self, FlowError> {
        let spreadsheet_id = recording
            .spreadsheet_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FlowError::Sink("recording.spreadsheet_id is not set".into()))?;
        let token = recording
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FlowError::Sink("Sheets access token is not set".into()))?;
        Self::new(recording.endpoint.clone(), spreadsheet_id, token)
    }
}

#[async_trait]
impl ResultSink for GoogleSheetsSink {
    async fn write_cell(&self, cell: &CellAddress, value: &str) -> Result<(), FlowError> {
        let range = cell.range();
        let url = update_url(&self.endpoint, &self.spreadsheet_id, &range)?;
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [[value]],
            }))
            .send()
            .await
            .map_err(|e| FlowError::Sink(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Sink(format!("HTTP {status} updating {range}: {body}")));
        }
        info!(range = %range, value = %value, "Sheet cell updated");
        Ok(())
    }
}

/// `{endpoint}/spreadsheets/{id}/values/{range}?valueInputOption=RAW`
fn update_url(endpoint: &str, spreadsheet_id: &str, range: &str) -> Result<Url, FlowError> {
    let mut url =
        Url::parse(endpoint).map_err(|e| FlowError::Sink(format!("bad endpoint: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| FlowError::Sink("endpoint cannot be a base".into()))?
        .pop_if_empty()
        .extend(["spreadsheets", spreadsheet_id, "values", range]);
    url.query_pairs_mut().append_pair("valueInputOption", "RAW");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_url() {
        let url = update_url("https://sheets.googleapis.com/v4", "abc", "Checklist!F4").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Checklist!F4?valueInputOption=RAW"
        );
    }

    #[test]
    fn test_update_url_encodes_quoted_sheet() {
        let url = update_url("https://sheets.googleapis.com/v4/", "abc", "'Smoke Run'!F4").unwrap();
        assert!(url.as_str().contains("/values/'Smoke%20Run'!F4?"));
    }

    #[test]
    fn test_from_config_requires_token() {
        let recording = RecordingConfig {
            spreadsheet_id: Some("abc".into()),
            ..RecordingConfig::default()
        };
        let err = GoogleSheetsSink::from_config(&recording).unwrap_err();
        assert!(matches!(err, FlowError::Sink(_)));
    }
}
