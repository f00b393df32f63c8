//! Configuration for a sync run
//!
//! [`SyncConfig`] is loaded once at startup and handed to every component
//! constructor. [`OAuthClientSecret`] parses the client-secret file downloaded
//! from Google Cloud Console.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config filename in the sheetsync config directory
pub const CONFIG_FILE: &str = "config.json";

/// Scope granting read access and label changes on Gmail messages
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Scope granting read/write access to spreadsheets
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// How the spreadsheet API is authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetsAuthMode {
    /// Non-interactive service-account key
    #[default]
    ServiceAccount,
    /// Share the interactive OAuth session used for Gmail
    Oauth,
}

/// What to do when the existing-ID column cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingIdsPolicy {
    /// Treat the sheet as empty and continue (risks duplicate rows)
    #[default]
    FailOpen,
    /// Abort the run
    FailClosed,
}

/// How pending rows are written to the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendMode {
    /// One append call for the whole batch
    #[default]
    Batched,
    /// One append call per row, stopping at the first failure
    PerRow,
}

/// Settings for a single sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Target spreadsheet ID (from the sheet URL)
    pub spreadsheet_id: String,
    /// Tab name within the spreadsheet
    pub sheet_name: String,
    /// OAuth scopes requested for both APIs
    pub scopes: Vec<String>,
    /// OAuth client-secret file
    pub credentials_file: PathBuf,
    /// Persisted OAuth token file
    pub token_file: PathBuf,
    /// Service-account key file
    pub service_account_file: PathBuf,
    pub sheets_auth: SheetsAuthMode,
    /// Ceiling for every HTTP call, in seconds
    pub request_timeout_secs: u64,
    pub existing_ids_policy: ExistingIdsPolicy,
    pub append_mode: AppendMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: "Sheet1".to_string(),
            scopes: vec![
                GMAIL_MODIFY_SCOPE.to_string(),
                SPREADSHEETS_SCOPE.to_string(),
            ],
            credentials_file: PathBuf::from("credentials/credentials.json"),
            token_file: PathBuf::from("credentials/token.json"),
            service_account_file: PathBuf::from("service_account.json"),
            sheets_auth: SheetsAuthMode::default(),
            request_timeout_secs: 30,
            existing_ids_policy: ExistingIdsPolicy::default(),
            append_mode: AppendMode::default(),
        }
    }
}

impl SyncConfig {
    /// Load from ~/.config/sheetsync/config.json, falling back to defaults
    /// when the file does not exist. The result is validated.
    pub fn load() -> Result<Self> {
        let cfg = if config::config_exists(CONFIG_FILE) {
            config::load_json(CONFIG_FILE)?
        } else {
            Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a config from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let cfg: Self = config::load_json_file(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that cannot produce a working run
    pub fn validate(&self) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            anyhow::bail!(
                "spreadsheet_id is not configured (set it in {})",
                config::config_path(CONFIG_FILE)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| CONFIG_FILE.to_string())
            );
        }
        if self.sheet_name.trim().is_empty() {
            anyhow::bail!("sheet_name must not be empty");
        }
        if self.scopes.is_empty() {
            anyhow::bail!("at least one OAuth scope is required");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Range holding recorded message IDs (column A below the header)
    pub fn id_range(&self) -> String {
        format!("{}!A2:A", self.sheet_name)
    }

    /// Range new rows are appended to
    pub fn append_range(&self) -> String {
        format!("{}!A:E", self.sheet_name)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// OAuth client credentials for the installed-app flow
#[derive(Debug, Clone)]
pub struct OAuthClientSecret {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthClientSecret {
    /// Load credentials from a client-secret JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed_credentials() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;

        let creds = OAuthClientSecret::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn test_parse_web_credentials() {
        let json = r#"{
            "web": {
                "client_id": "web-client-id.apps.googleusercontent.com",
                "client_secret": "web-secret"
            }
        }"#;

        let creds = OAuthClientSecret::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-client-id.apps.googleusercontent.com");
    }

    #[test]
    fn test_invalid_credentials_json() {
        assert!(OAuthClientSecret::from_json(r#"{ "other": {} }"#).is_err());
    }

    #[test]
    fn test_defaults() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.sheet_name, "Sheet1");
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.scopes.len(), 2);
        assert_eq!(cfg.existing_ids_policy, ExistingIdsPolicy::FailOpen);
        assert_eq!(cfg.append_mode, AppendMode::Batched);
        assert_eq!(cfg.sheets_auth, SheetsAuthMode::ServiceAccount);
    }

    #[test]
    fn test_ranges() {
        let cfg = SyncConfig {
            sheet_name: "Inbox".to_string(),
            ..SyncConfig::default()
        };
        assert_eq!(cfg.id_range(), "Inbox!A2:A");
        assert_eq!(cfg.append_range(), "Inbox!A:E");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: SyncConfig = serde_json::from_str(
            r#"{ "spreadsheet_id": "abc", "append_mode": "per_row", "existing_ids_policy": "fail_closed" }"#,
        )
        .unwrap();
        assert_eq!(cfg.spreadsheet_id, "abc");
        assert_eq!(cfg.sheet_name, "Sheet1");
        assert_eq!(cfg.append_mode, AppendMode::PerRow);
        assert_eq!(cfg.existing_ids_policy, ExistingIdsPolicy::FailClosed);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_spreadsheet() {
        let err = SyncConfig::default().validate().unwrap_err().to_string();
        assert!(err.contains("spreadsheet_id"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let cfg = SyncConfig {
            spreadsheet_id: "abc".to_string(),
            request_timeout_secs: 0,
            ..SyncConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "spreadsheet_id": "sheet-123", "sheet_name": "Mail" }"#)
            .unwrap();

        let cfg = SyncConfig::from_file(&path).unwrap();
        assert_eq!(cfg.spreadsheet_id, "sheet-123");
        assert_eq!(cfg.id_range(), "Mail!A2:A");
    }
}
