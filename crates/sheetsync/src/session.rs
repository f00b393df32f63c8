//! Building authorized sessions from configuration

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use crate::auth::{AccessTokenSource, OAuthInstalledAuth, ServiceAccountAuth};
use crate::config::{SheetsAuthMode, SyncConfig};
use crate::gmail::{GmailClient, MailReader};
use crate::http;
use crate::sheets::{SheetStore, SheetsClient};
use crate::sync::{SyncOptions, SyncPhase, SyncStats, sync_inbox_to_sheet};

/// The two authorized components a sync run needs
pub struct Sessions {
    pub reader: MailReader,
    pub store: SheetStore,
}

impl Sessions {
    /// Authorize both APIs. May open a browser for OAuth consent and may
    /// write the token file.
    pub fn connect(config: &SyncConfig) -> Result<Self> {
        let agent = http::agent(config.request_timeout());

        let gmail_auth = Arc::new(
            OAuthInstalledAuth::obtain(
                &config.credentials_file,
                &config.token_file,
                config.scopes.clone(),
                agent.clone(),
            )
            .context("Failed to authorize Gmail access")?,
        );

        let sheets_auth: Arc<dyn AccessTokenSource> = match config.sheets_auth {
            SheetsAuthMode::ServiceAccount => {
                let auth = ServiceAccountAuth::from_file(
                    &config.service_account_file,
                    config.scopes.clone(),
                    agent.clone(),
                )
                .context("Failed to load service account for Sheets access")?;
                info!("Using service account {} for Sheets", auth.client_email());
                Arc::new(auth)
            }
            SheetsAuthMode::Oauth => gmail_auth.clone(),
        };

        let gmail = GmailClient::new(gmail_auth, agent.clone());
        let sheets = SheetsClient::new(sheets_auth, agent, config.spreadsheet_id.clone());

        Ok(Self {
            reader: MailReader::new(Arc::new(gmail)),
            store: SheetStore::new(Arc::new(sheets), config),
        })
    }
}

/// Authorize and run one sync pass
pub fn run(config: &SyncConfig) -> Result<SyncStats> {
    let sessions = Sessions::connect(config)
        .with_context(|| format!("Sync aborted in phase {}", SyncPhase::Init))?;
    sync_inbox_to_sheet(&sessions.reader, &sessions.store, &SyncOptions::from(config))
}
