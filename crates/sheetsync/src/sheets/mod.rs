//! Google Sheets API integration
//!
//! - [`SheetsApi`]: the two value operations the sync uses
//! - [`SheetsClient`]: HTTP implementation
//! - [`SheetStore`]: existing-ID lookup and row appends
//! - [`InMemorySheet`]: fake transport for tests

mod client;
mod memory;
mod store;

pub use client::SheetsClient;
pub use memory::InMemorySheet;
pub use store::SheetStore;

use anyhow::Result;

/// Spreadsheet value operations against a single spreadsheet
pub trait SheetsApi: Send + Sync {
    /// Read the cells in an A1 range
    fn read_range(&self, range: &str) -> Result<api::ValueRange>;

    /// Append rows after the last row of the table found in `range`
    fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<api::AppendResponse>;
}

/// Sheets API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// `spreadsheets.values.get` response and `append` request body
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ValueRange {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub range: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub major_dimension: Option<String>,
        /// Absent when the range is empty
        pub values: Option<Vec<Vec<String>>>,
    }

    /// `spreadsheets.values.append` response
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AppendResponse {
        pub spreadsheet_id: Option<String>,
        pub table_range: Option<String>,
        pub updates: Option<UpdateValuesResponse>,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdateValuesResponse {
        pub updated_range: Option<String>,
        pub updated_rows: Option<u32>,
        pub updated_cells: Option<u32>,
    }
}
