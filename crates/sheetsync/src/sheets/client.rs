//! Google Sheets API HTTP client

use anyhow::{Context, Result};
use log::debug;
use std::sync::Arc;

use super::SheetsApi;
use super::api::{AppendResponse, ValueRange};
use crate::auth::AccessTokenSource;
use crate::http::bearer;

/// Sheets v4 client bound to one spreadsheet
pub struct SheetsClient {
    auth: Arc<dyn AccessTokenSource>,
    agent: ureq::Agent,
    spreadsheet_id: String,
}

impl SheetsClient {
    /// Sheets API base URL
    const BASE_URL: &'static str = "https://sheets.googleapis.com/v4";

    pub fn new(
        auth: Arc<dyn AccessTokenSource>,
        agent: ureq::Agent,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            agent,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            Self::BASE_URL,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    fn append_url(&self, range: &str) -> String {
        format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(range)
        )
    }
}

impl SheetsApi for SheetsClient {
    fn read_range(&self, range: &str) -> Result<ValueRange> {
        let access_token = self.auth.access_token()?;

        let mut response = self
            .agent
            .get(&self.values_url(range))
            .header("Authorization", &bearer(&access_token))
            .call()
            .with_context(|| format!("Failed to read range {}", range))?;

        let values: ValueRange = response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse values for range {}", range))?;

        Ok(values)
    }

    fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<AppendResponse> {
        let access_token = self.auth.access_token()?;
        let row_count = rows.len();

        let body = ValueRange {
            range: None,
            major_dimension: Some("ROWS".to_string()),
            values: Some(rows),
        };

        let mut response = self
            .agent
            .post(&self.append_url(range))
            .header("Authorization", &bearer(&access_token))
            .send_json(&body)
            .with_context(|| format!("Failed to append {} row(s) to {}", row_count, range))?;

        let appended: AppendResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse append response")?;

        debug!(
            "Appended {} row(s) at {}",
            row_count,
            appended
                .updates
                .as_ref()
                .and_then(|u| u.updated_range.as_deref())
                .unwrap_or(range)
        );
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use std::time::Duration;

    fn client() -> SheetsClient {
        SheetsClient::new(
            Arc::new(StaticToken("token".to_string())),
            crate::http::agent(Duration::from_secs(1)),
            "sheet-123",
        )
    }

    #[test]
    fn test_values_url_encodes_range() {
        assert_eq!(
            client().values_url("Sheet1!A2:A"),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/Sheet1%21A2%3AA"
        );
    }

    #[test]
    fn test_append_url_options() {
        let url = client().append_url("My Tab!A:E");
        assert!(url.contains("/values/My%20Tab%21A%3AE:append?"));
        assert!(url.ends_with("valueInputOption=RAW&insertDataOption=INSERT_ROWS"));
    }

    #[test]
    fn test_append_body_shape() {
        let body = ValueRange {
            range: None,
            major_dimension: Some("ROWS".to_string()),
            values: Some(vec![vec!["m1".to_string(), "a".to_string()]]),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "majorDimension": "ROWS", "values": [["m1", "a"]] })
        );
    }

    #[test]
    fn test_empty_range_response_has_no_values() {
        let parsed: ValueRange =
            serde_json::from_str(r#"{ "range": "Sheet1!A2:A1000", "majorDimension": "ROWS" }"#)
                .unwrap();
        assert!(parsed.values.is_none());
    }
}
