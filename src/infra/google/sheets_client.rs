// Google Sheets implementation of `SheetSource`.
//
// All catalog ranges are read with a single `values:batchGet` call.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::service_account::ServiceAccountAuth;
use crate::core::catalog::{SheetError, SheetSource, ValueRange};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

// =============================================================================
// SHEETS API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ApiValueRange>,
}

#[derive(Debug, Deserialize)]
struct ApiValueRange {
    #[serde(default)]
    range: String,
    /// Absent when the range is entirely empty.
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Renders a cell as the text the sheet shows. Formatted values already come
/// back as strings; the other arms cover unformatted render options.
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(true) => "TRUE".to_string(),
        serde_json::Value::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

fn into_value_ranges(response: BatchGetResponse) -> Vec<ValueRange> {
    response
        .value_ranges
        .into_iter()
        .map(|api| ValueRange {
            range: api.range,
            values: api
                .values
                .iter()
                .map(|row| row.iter().map(cell_text).collect())
                .collect(),
        })
        .collect()
}

// =============================================================================
// GOOGLE SHEETS CLIENT
// =============================================================================

pub struct GoogleSheetsClient {
    client: Client,
    auth: ServiceAccountAuth,
    base_url: String,
}

impl GoogleSheetsClient {
    pub fn new(client: Client, auth: ServiceAccountAuth) -> Self {
        Self {
            client,
            auth,
            base_url: SHEETS_API_BASE.to_string(),
        }
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsClient {
    async fn batch_get(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
    ) -> Result<Vec<ValueRange>, SheetError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| SheetError::Auth(e.to_string()))?;

        let url = format!(
            "{}/v4/spreadsheets/{}/values:batchGet",
            self.base_url, spreadsheet_id
        );

        let mut query: Vec<(&str, &str)> = ranges.iter().map(|r| ("ranges", r.as_str())).collect();
        query.push(("majorDimension", "ROWS"));

        tracing::debug!(
            spreadsheet_id,
            ranges = ranges.len(),
            "Fetching sheet ranges"
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| SheetError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .map_err(|e| SheetError::Transport(e.to_string()))?;
            return Err(SheetError::Api {
                status,
                message: format!(
                    "{}. Make sure the sheet is shared with {}.",
                    message.trim(),
                    self.auth.client_email()
                ),
            });
        }

        let body: BatchGetResponse = response
            .json()
            .await
            .map_err(|e| SheetError::Decode(e.to_string()))?;

        Ok(into_value_ranges(body))
    }
}
