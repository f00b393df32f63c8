//! Sheetsync - copy unread Gmail messages into a Google Sheet
//!
//! This crate provides:
//! - OAuth2 (installed app) and service-account credential providers
//! - A Gmail reader that lists, parses and marks messages read
//! - A sheet store that reads recorded message IDs and appends rows
//! - The reconciliation pass tying them together
//!
//! Remote APIs sit behind the [`MailApi`] and [`SheetsApi`] traits so the sync
//! can run against [`InMemoryMailbox`] and [`InMemorySheet`] in tests.

pub mod auth;
pub mod config;
pub mod gmail;
pub mod http;
pub mod models;
pub mod session;
pub mod sheets;
pub mod sync;

pub use auth::{AccessTokenSource, AuthError, OAuthInstalledAuth, ServiceAccountAuth};
pub use config::{AppendMode, ExistingIdsPolicy, OAuthClientSecret, SheetsAuthMode, SyncConfig};
pub use gmail::{GmailClient, InMemoryMailbox, MailApi, MailReader, ParseError};
pub use models::{MessageId, ParsedEmail, SheetRow};
pub use session::{Sessions, run};
pub use sheets::{InMemorySheet, SheetStore, SheetsApi, SheetsClient};
pub use sync::{SyncOptions, SyncPhase, SyncStats, sync_inbox_to_sheet};
