//! In-memory spreadsheet
//!
//! A [`SheetsApi`] fake holding one tab as a vector of rows. Reads return the
//! first column starting at the range's first row, mimicking how the Sheets
//! API trims trailing empty rows. Reads and appends can be made to fail.

use anyhow::{Result, anyhow};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::SheetsApi;
use super::api::{AppendResponse, UpdateValuesResponse, ValueRange};

/// Header written by [`InMemorySheet::with_header`]
pub const HEADER: [&str; 5] = ["Message ID", "From", "Subject", "Date", "Content"];

pub struct InMemorySheet {
    rows: RwLock<Vec<Vec<String>>>,
    has_header: bool,
    failing_reads: AtomicBool,
    /// Append calls with this index or later fail
    fail_appends_from: RwLock<Option<usize>>,
    append_calls: AtomicUsize,
}

impl Default for InMemorySheet {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySheet {
    /// A completely empty sheet
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            has_header: false,
            failing_reads: AtomicBool::new(false),
            fail_appends_from: RwLock::new(None),
            append_calls: AtomicUsize::new(0),
        }
    }

    /// A sheet whose first row is the column header
    pub fn with_header() -> Self {
        let sheet = Self {
            has_header: true,
            ..Self::new()
        };
        sheet.push_row(&HEADER);
        sheet
    }

    pub fn push_row(&self, cells: &[&str]) {
        self.rows
            .write()
            .unwrap()
            .push(cells.iter().map(|c| c.to_string()).collect());
    }

    pub fn fail_reads(&self) {
        self.failing_reads.store(true, Ordering::SeqCst);
    }

    /// Fail the append call with index `call` (0-based) and every call after it
    pub fn fail_appends_from(&self, call: usize) {
        *self.fail_appends_from.write().unwrap() = Some(call);
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// All rows below the header
    pub fn data_rows(&self) -> Vec<Vec<String>> {
        let skip = usize::from(self.has_header);
        self.rows.read().unwrap().iter().skip(skip).cloned().collect()
    }

    /// IDs in column A below the header, in row order
    pub fn recorded_ids(&self) -> Vec<String> {
        self.data_rows()
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect()
    }
}

/// First row number of an A1 range such as `Sheet1!A2:A` (1 when omitted)
fn start_row(range: &str) -> Option<usize> {
    let cells = range.rsplit('!').next()?;
    let start = cells.split(':').next()?;
    let digits: String = start
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic())
        .collect();
    if digits.is_empty() {
        Some(1)
    } else {
        digits.parse().ok().filter(|row| *row >= 1)
    }
}

impl SheetsApi for InMemorySheet {
    fn read_range(&self, range: &str) -> Result<ValueRange> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("Failed to read range {}: injected failure", range));
        }

        let first = start_row(range).ok_or_else(|| anyhow!("Unsupported range: {}", range))?;

        let mut values: Vec<Vec<String>> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .skip(first - 1)
            .map(|row| match row.first() {
                Some(cell) if !cell.is_empty() => vec![cell.clone()],
                _ => Vec::new(),
            })
            .collect();

        while values.last().is_some_and(|row| row.is_empty()) {
            values.pop();
        }

        Ok(ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values: if values.is_empty() { None } else { Some(values) },
        })
    }

    fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<AppendResponse> {
        let call = self.append_calls.fetch_add(1, Ordering::SeqCst);

        let fail_from = *self.fail_appends_from.read().unwrap();
        if fail_from.is_some_and(|from| call >= from) {
            return Err(anyhow!("Failed to append to {}: injected failure", range));
        }

        let added = rows.len();
        let cells: usize = rows.iter().map(Vec::len).sum();
        self.rows.write().unwrap().extend(rows);

        Ok(AppendResponse {
            spreadsheet_id: Some("in-memory".to_string()),
            table_range: Some(range.to_string()),
            updates: Some(UpdateValuesResponse {
                updated_range: Some(range.to_string()),
                updated_rows: Some(added as u32),
                updated_cells: Some(cells as u32),
            }),
        })
    }
}
