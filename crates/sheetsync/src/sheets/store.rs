//! Sheet Store: recorded message IDs and row appends

use anyhow::{Context, Result};
use log::warn;
use std::collections::HashSet;
use std::sync::Arc;

use super::SheetsApi;
use crate::config::{ExistingIdsPolicy, SyncConfig};
use crate::models::{MessageId, SheetRow};

pub struct SheetStore {
    api: Arc<dyn SheetsApi>,
    id_range: String,
    append_range: String,
    policy: ExistingIdsPolicy,
}

impl SheetStore {
    pub fn new(api: Arc<dyn SheetsApi>, config: &SyncConfig) -> Self {
        Self {
            api,
            id_range: config.id_range(),
            append_range: config.append_range(),
            policy: config.existing_ids_policy,
        }
    }

    /// Message IDs already recorded in column A (header row excluded).
    ///
    /// With [`ExistingIdsPolicy::FailOpen`] a failed read is logged and
    /// reported as an empty set; with `FailClosed` the error is returned.
    pub fn existing_ids(&self) -> Result<HashSet<MessageId>> {
        match self.read_ids() {
            Ok(ids) => Ok(ids),
            Err(e) => match self.policy {
                ExistingIdsPolicy::FailOpen => {
                    warn!(
                        "Could not read existing message IDs, assuming none are recorded: {:#}",
                        e
                    );
                    Ok(HashSet::new())
                }
                ExistingIdsPolicy::FailClosed => Err(e),
            },
        }
    }

    fn read_ids(&self) -> Result<HashSet<MessageId>> {
        let range = self
            .api
            .read_range(&self.id_range)
            .with_context(|| format!("Failed to read existing IDs from {}", self.id_range))?;

        Ok(range
            .values
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|cell| cell.trim().to_string())
            .filter(|cell| !cell.is_empty())
            .map(MessageId::from)
            .collect())
    }

    /// Append a single row in one call
    pub fn append(&self, row: &SheetRow) -> Result<()> {
        self.api
            .append_rows(&self.append_range, vec![row.clone().into_values()])
            .with_context(|| format!("Failed to append row for message {}", row.id))?;
        Ok(())
    }

    /// Append all rows in one call. An empty slice makes no call.
    pub fn append_many(&self, rows: &[SheetRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let values = rows.iter().cloned().map(SheetRow::into_values).collect();
        self.api
            .append_rows(&self.append_range, values)
            .with_context(|| format!("Failed to append {} rows", rows.len()))?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::InMemorySheet;

    fn config(policy: ExistingIdsPolicy) -> SyncConfig {
        SyncConfig {
            spreadsheet_id: "sheet-123".to_string(),
            existing_ids_policy: policy,
            ..SyncConfig::default()
        }
    }

    fn row(id: &str) -> SheetRow {
        SheetRow {
            id: MessageId::new(id),
            sender: "a@example.com".to_string(),
            subject: "subject".to_string(),
            date: "2024-01-15 10:30:00+00:00".to_string(),
            body: "body".to_string(),
        }
    }

    #[test]
    fn test_existing_ids_skip_header_and_blanks() {
        let sheet = Arc::new(InMemorySheet::with_header());
        sheet.push_row(&["m1", "a", "s", "d", "b"]);
        sheet.push_row(&[]);
        sheet.push_row(&["  ", "x"]);
        sheet.push_row(&["m2"]);

        let store = SheetStore::new(sheet.clone(), &config(ExistingIdsPolicy::FailOpen));
        let ids = store.existing_ids().unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&MessageId::new("m1")));
        assert!(ids.contains(&MessageId::new("m2")));
        assert!(!ids.contains(&MessageId::new("Message ID")));
    }

    #[test]
    fn test_existing_ids_empty_sheet() {
        let sheet = Arc::new(InMemorySheet::new());
        let store = SheetStore::new(sheet, &config(ExistingIdsPolicy::FailOpen));
        assert!(store.existing_ids().unwrap().is_empty());
    }

    #[test]
    fn test_existing_ids_fail_open() {
        let sheet = Arc::new(InMemorySheet::with_header());
        sheet.push_row(&["m1"]);
        sheet.fail_reads();

        let store = SheetStore::new(sheet, &config(ExistingIdsPolicy::FailOpen));
        assert!(store.existing_ids().unwrap().is_empty());
    }

    #[test]
    fn test_existing_ids_fail_closed() {
        let sheet = Arc::new(InMemorySheet::with_header());
        sheet.fail_reads();

        let store = SheetStore::new(sheet, &config(ExistingIdsPolicy::FailClosed));
        let err = store.existing_ids().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read existing IDs from Sheet1!A2:A"));
    }

    #[test]
    fn test_append_many_empty_makes_no_call() {
        let sheet = Arc::new(InMemorySheet::with_header());
        sheet.fail_appends_from(0);

        let store = SheetStore::new(sheet.clone(), &config(ExistingIdsPolicy::FailOpen));
        assert_eq!(store.append_many(&[]).unwrap(), 0);
        assert_eq!(sheet.append_calls(), 0);
    }

    #[test]
    fn test_append_many_single_call() {
        let sheet = Arc::new(InMemorySheet::with_header());
        let store = SheetStore::new(sheet.clone(), &config(ExistingIdsPolicy::FailOpen));

        assert_eq!(store.append_many(&[row("m1"), row("m2")]).unwrap(), 2);
        assert_eq!(sheet.append_calls(), 1);
        assert_eq!(sheet.data_rows().len(), 2);
        assert_eq!(sheet.data_rows()[1][0], "m2");
    }

    #[test]
    fn test_append_failure_has_context() {
        let sheet = Arc::new(InMemorySheet::with_header());
        sheet.fail_appends_from(0);
        let store = SheetStore::new(sheet.clone(), &config(ExistingIdsPolicy::FailOpen));

        let err = store.append(&row("m7")).unwrap_err();
        assert!(err.to_string().contains("Failed to append row for message m7"));
        assert!(sheet.data_rows().is_empty());
    }
}
