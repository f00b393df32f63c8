//! Sync orchestrator

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use crate::config::{AppendMode, SyncConfig};
use crate::gmail::MailReader;
use crate::models::{MessageId, SheetRow};
use crate::sheets::SheetStore;

/// Stages of a sync run. A fatal error aborts the run in whichever stage it
/// occurs and is reported with that stage as context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Init,
    Authenticated,
    Deduped,
    Fetched,
    Written,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Init => "init",
            SyncPhase::Authenticated => "authenticated",
            SyncPhase::Deduped => "deduped",
            SyncPhase::Fetched => "fetched",
            SyncPhase::Written => "written",
            SyncPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Options for a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub append_mode: AppendMode,
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            append_mode: config.append_mode,
        }
    }
}

/// Statistics from a sync run
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    /// Unread inbox messages listed
    pub unread_listed: usize,
    /// Unread messages whose ID was already in the sheet
    pub already_recorded: usize,
    /// New messages parsed into rows
    pub parsed: usize,
    /// New messages that failed to parse (left unread)
    pub parse_failures: usize,
    /// Rows written to the sheet
    pub rows_appended: usize,
    /// Messages whose UNREAD label was removed
    pub marked_read: usize,
    pub mark_read_failures: usize,
    /// Set when writing rows stopped early
    pub append_error: Option<String>,
    pub duration_ms: u64,
}

impl SyncStats {
    /// Whether every listed message was handled without error
    pub fn is_clean(&self) -> bool {
        self.parse_failures == 0 && self.mark_read_failures == 0 && self.append_error.is_none()
    }
}

/// Run one reconciliation pass.
///
/// Messages already recorded in the sheet are only marked read. New messages
/// are parsed, queued as rows and marked read; the queued rows are written
/// after the scan. Parse and mark-read failures are logged and skipped; an
/// append failure stops further writes but keeps rows already written.
///
/// Returns an error only when the recorded IDs (under a fail-closed policy) or
/// the unread listing cannot be read.
pub fn sync_inbox_to_sheet(
    reader: &MailReader,
    store: &SheetStore,
    options: &SyncOptions,
) -> Result<SyncStats> {
    let start = Instant::now();
    let mut stats = SyncStats::default();
    let mut phase = SyncPhase::Authenticated;

    let existing = store
        .existing_ids()
        .with_context(|| format!("Sync aborted in phase {}", phase))?;
    info!("Found {} existing emails in the sheet.", existing.len());
    phase = advance(phase, SyncPhase::Deduped);

    let unread = reader
        .list_unread()
        .with_context(|| format!("Sync aborted in phase {}", phase))?;
    stats.unread_listed = unread.len();

    if unread.is_empty() {
        info!("No new unread emails.");
        advance(phase, SyncPhase::Done);
        stats.duration_ms = start.elapsed().as_millis() as u64;
        return Ok(stats);
    }
    info!("Fetched {} unread emails from Gmail.", unread.len());

    let mut pending: Vec<SheetRow> = Vec::new();
    let mut queued: HashSet<MessageId> = HashSet::new();

    for id in &unread {
        if existing.contains(id) {
            info!("Email {} already exists. Marking as read.", id);
            stats.already_recorded += 1;
            mark_read(reader, id, &mut stats);
            continue;
        }

        if queued.contains(id) {
            debug!("Email {} listed twice, skipping repeat", id);
            continue;
        }

        match reader.parse(id) {
            Ok(email) => {
                stats.parsed += 1;
                queued.insert(id.clone());
                pending.push(SheetRow::from(email));
                mark_read(reader, id, &mut stats);
            }
            Err(e) => {
                error!("Failed to parse email {}: {:#}", id, e);
                stats.parse_failures += 1;
            }
        }
    }
    phase = advance(phase, SyncPhase::Fetched);

    if pending.is_empty() {
        info!("No new emails to append.");
    } else {
        write_rows(store, &pending, options.append_mode, &mut stats);
    }
    phase = advance(phase, SyncPhase::Written);

    advance(phase, SyncPhase::Done);
    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Gmail to Sheets sync completed: {} appended, {} already recorded, {} failed to parse in {}ms",
        stats.rows_appended, stats.already_recorded, stats.parse_failures, stats.duration_ms
    );
    Ok(stats)
}

fn advance(from: SyncPhase, to: SyncPhase) -> SyncPhase {
    debug!("Sync phase {} -> {}", from, to);
    to
}

/// Remove the UNREAD label. A failure leaves the message unread; the next run
/// picks it up again and, if its row landed, only marks it read.
fn mark_read(reader: &MailReader, id: &MessageId, stats: &mut SyncStats) {
    match reader.mark_read(id) {
        Ok(()) => stats.marked_read += 1,
        Err(e) => {
            warn!("Failed to mark email {} as read: {:#}", id, e);
            stats.mark_read_failures += 1;
        }
    }
}

fn write_rows(store: &SheetStore, rows: &[SheetRow], mode: AppendMode, stats: &mut SyncStats) {
    match mode {
        AppendMode::Batched => match store.append_many(rows) {
            Ok(count) => {
                stats.rows_appended = count;
                info!("Successfully appended {} emails to Google Sheets.", count);
            }
            Err(e) => {
                error!("Failed to append rows to Google Sheets: {:#}", e);
                stats.append_error = Some(format!("{:#}", e));
            }
        },
        AppendMode::PerRow => {
            for row in rows {
                if let Err(e) = store.append(row) {
                    error!(
                        "Failed to append rows to Google Sheets after {} of {}: {:#}",
                        stats.rows_appended,
                        rows.len(),
                        e
                    );
                    stats.append_error = Some(format!("{:#}", e));
                    return;
                }
                stats.rows_appended += 1;
            }
            info!(
                "Successfully appended {} emails to Google Sheets.",
                stats.rows_appended
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExistingIdsPolicy;
    use crate::gmail::{InMemoryMailbox, plain_text_message};
    use crate::sheets::InMemorySheet;
    use std::sync::Arc;

    const DATE: &str = "Mon, 15 Jan 2024 10:30:00 +0000";

    fn setup(ids: &[&str]) -> (Arc<InMemoryMailbox>, Arc<InMemorySheet>) {
        let mailbox = Arc::new(InMemoryMailbox::new());
        for id in ids {
            mailbox.insert(plain_text_message(id, "a@example.com", "subject", DATE, "body"));
        }
        (mailbox, Arc::new(InMemorySheet::with_header()))
    }

    fn run(
        mailbox: &Arc<InMemoryMailbox>,
        sheet: &Arc<InMemorySheet>,
        mode: AppendMode,
    ) -> Result<SyncStats> {
        let config = SyncConfig {
            spreadsheet_id: "sheet".to_string(),
            append_mode: mode,
            existing_ids_policy: ExistingIdsPolicy::FailOpen,
            ..SyncConfig::default()
        };
        let reader = MailReader::new(mailbox.clone());
        let store = SheetStore::new(sheet.clone(), &config);
        sync_inbox_to_sheet(&reader, &store, &SyncOptions::from(&config))
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SyncPhase::Deduped.to_string(), "deduped");
        assert_eq!(SyncPhase::Done.to_string(), "done");
    }

    #[test]
    fn test_empty_inbox_appends_nothing() {
        let (mailbox, sheet) = setup(&[]);
        let stats = run(&mailbox, &sheet, AppendMode::Batched).unwrap();
        assert_eq!(stats.unread_listed, 0);
        assert_eq!(sheet.append_calls(), 0);
        assert!(stats.is_clean());
    }

    #[test]
    fn test_mark_read_failure_keeps_row() {
        let (mailbox, sheet) = setup(&["m1", "m2"]);
        mailbox.fail_modify("m1");

        let stats = run(&mailbox, &sheet, AppendMode::Batched).unwrap();

        assert_eq!(stats.rows_appended, 2);
        assert_eq!(stats.mark_read_failures, 1);
        assert!(mailbox.is_unread("m1"));
        assert!(!mailbox.is_unread("m2"));
        assert!(!stats.is_clean());
    }

    #[test]
    fn test_batched_append_failure_writes_nothing() {
        let (mailbox, sheet) = setup(&["m1", "m2"]);
        sheet.fail_appends_from(0);

        let stats = run(&mailbox, &sheet, AppendMode::Batched).unwrap();

        assert_eq!(stats.rows_appended, 0);
        assert_eq!(sheet.append_calls(), 1);
        assert!(stats.append_error.is_some());
        assert!(sheet.data_rows().is_empty());
    }

    #[test]
    fn test_per_row_halts_on_first_failure() {
        let (mailbox, sheet) = setup(&["m1", "m2", "m3"]);
        sheet.fail_appends_from(1);

        let stats = run(&mailbox, &sheet, AppendMode::PerRow).unwrap();

        assert_eq!(stats.rows_appended, 1);
        assert_eq!(sheet.append_calls(), 2);
        assert_eq!(sheet.recorded_ids(), vec!["m1"]);
        assert!(stats.append_error.is_some());
    }
}
