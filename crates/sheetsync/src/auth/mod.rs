//! Credential providers for the Google APIs
//!
//! - [`OAuthInstalledAuth`]: interactive installed-app flow with a persisted
//!   token file, refreshed in place when it expires
//! - [`ServiceAccountAuth`]: non-interactive JWT-bearer flow from a key file

mod oauth;
mod service_account;

pub use oauth::OAuthInstalledAuth;
pub use service_account::ServiceAccountAuth;

use anyhow::Result;

/// Google OAuth2 token endpoint
pub(crate) const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this many seconds are treated as expired
pub(crate) const EXPIRY_BUFFER_SECS: i64 = 300;

/// Source of bearer tokens for API requests
pub trait AccessTokenSource: Send + Sync {
    /// Return an access token valid for at least the next few minutes
    fn access_token(&self) -> Result<String>;
}

/// Authorization failures callers may want to tell apart
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("OAuth consent failed: {0}")]
    ConsentDenied(String),
    #[error("No authorization code received")]
    MissingAuthorizationCode,
    #[error("Invalid key type: expected 'service_account', got '{0}'")]
    InvalidKeyType(String),
}

/// A fixed token, for tests and pre-authorized environments
pub struct StaticToken(pub String);

impl AccessTokenSource for StaticToken {
    fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
