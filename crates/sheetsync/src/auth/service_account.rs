//! Service-account authentication
//!
//! Signs an RS256 JWT assertion with the account's private key and exchanges
//! it for a short-lived access token. Nothing is persisted; the token is
//! cached in memory and re-minted when it nears expiry.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use super::{AccessTokenSource, AuthError, EXPIRY_BUFFER_SECS, TOKEN_URL};

/// Fields used from a Google service-account key file
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Non-interactive session backed by a service-account key
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    scopes: Vec<String>,
    agent: ureq::Agent,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Load a key file. The key type and PEM are checked up front so a bad
    /// file fails at startup rather than on the first request.
    pub fn from_file(path: &Path, scopes: Vec<String>, agent: ureq::Agent) -> Result<Self> {
        let key: ServiceAccountKey = config::load_json_file(path)?;
        Self::new(key, scopes, agent)
            .with_context(|| format!("Invalid service account key: {}", path.display()))
    }

    pub fn from_json(json: &str, scopes: Vec<String>, agent: ureq::Agent) -> Result<Self> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).context("Failed to parse service account JSON")?;
        Self::new(key, scopes, agent)
    }

    fn new(key: ServiceAccountKey, scopes: Vec<String>, agent: ureq::Agent) -> Result<Self> {
        if key.key_type != "service_account" {
            return Err(AuthError::InvalidKeyType(key.key_type).into());
        }

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Failed to load service account private key")?;

        Ok(Self {
            key,
            signing_key,
            scopes,
            agent,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn claims(&self, now: i64) -> JwtClaims<'_> {
        JwtClaims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            exp: now + Duration::hours(1).num_seconds(),
            iat: now,
        }
    }

    fn mint_token(&self) -> Result<CachedToken> {
        let now = Utc::now().timestamp();
        let jwt = encode(
            &Header::new(Algorithm::RS256),
            &self.claims(now),
            &self.signing_key,
        )
        .context("Failed to sign service account assertion")?;

        debug!("Requesting access token for {}", self.key.client_email);

        let mut response = self
            .agent
            .post(&self.key.token_uri)
            .send_form([
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .context("Failed to exchange service account assertion")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse service account token response")?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}

impl AccessTokenSource for ServiceAccountAuth {
    fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());

        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref()
            && token.expires_at > now + EXPIRY_BUFFER_SECS
        {
            return Ok(token.access_token.clone());
        }

        let token = self.mint_token()?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }
}
