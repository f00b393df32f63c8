//! Gmail-to-sheet reconciliation
//!
//! A single sequential pass: read recorded IDs, list unread mail, parse what
//! is new, append rows, and mark processed messages read.

mod reconcile;

pub use reconcile::{SyncOptions, SyncPhase, SyncStats, sync_inbox_to_sheet};
