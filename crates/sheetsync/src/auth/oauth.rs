//! Installed-app OAuth2 authentication
//!
//! Implements the authorization code flow with a loopback redirect. The token
//! is persisted as JSON so later runs can reuse or refresh it without another
//! browser round-trip.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use url::Url;

use super::{AccessTokenSource, AuthError, EXPIRY_BUFFER_SECS, TOKEN_URL};
use crate::config::OAuthClientSecret;

/// Google OAuth2 consent endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Persisted token data
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at > now + EXPIRY_BUFFER_SECS)
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl TokenResponse {
    fn into_stored(self) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        }
    }
}

/// OAuth2 session for an installed (desktop) application
pub struct OAuthInstalledAuth {
    client: OAuthClientSecret,
    scopes: Vec<String>,
    token_path: PathBuf,
    agent: ureq::Agent,
    current: Mutex<Option<StoredToken>>,
}

impl OAuthInstalledAuth {
    pub fn new(
        client: OAuthClientSecret,
        scopes: Vec<String>,
        token_path: PathBuf,
        agent: ureq::Agent,
    ) -> Self {
        Self {
            client,
            scopes,
            token_path,
            agent,
            current: Mutex::new(None),
        }
    }

    /// Build a session from the client-secret file and authorize it now.
    ///
    /// Reuses the persisted token when still valid, refreshes it when expired,
    /// and otherwise runs the browser consent flow. The resulting token is
    /// written back to `token_file` before returning.
    pub fn obtain(
        credentials_file: &Path,
        token_file: &Path,
        scopes: Vec<String>,
        agent: ureq::Agent,
    ) -> Result<Self> {
        let client = OAuthClientSecret::from_file(credentials_file)?;
        let auth = Self::new(client, scopes, token_file.to_path_buf(), agent);
        auth.access_token()?;
        Ok(auth)
    }

    /// Resolve a usable token from disk, refresh, or consent (in that order)
    fn resolve_token(&self) -> Result<StoredToken> {
        let now = chrono::Utc::now().timestamp();

        if let Some(token) = self.load_token()? {
            if token.is_fresh(now) {
                return Ok(token);
            }

            if let Some(refresh_token) = &token.refresh_token {
                match self.refresh_access_token(refresh_token) {
                    Ok(refreshed) => {
                        info!("Refreshed OAuth access token");
                        self.save_token(&refreshed)?;
                        return Ok(refreshed);
                    }
                    Err(e) => warn!("Token refresh failed, re-authenticating: {:#}", e),
                }
            }
        }

        let token = self.authorization_code_auth()?;
        self.save_token(&token)?;
        Ok(token)
    }

    /// Perform authorization code flow authentication
    fn authorization_code_auth(&self) -> Result<StoredToken> {
        let listener =
            TcpListener::bind("127.0.0.1:0").context("Failed to bind OAuth callback listener")?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{}", port);
        let auth_url = self.consent_url(&redirect_uri);

        println!("\n=== Google Authentication Required ===");
        println!("Opening browser for authentication...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        println!("Waiting for authorization...");
        let code = wait_for_callback(&listener)?;

        let mut response = self
            .agent
            .post(TOKEN_URL)
            .send_form([
                ("client_id", self.client.client_id.as_str()),
                ("client_secret", self.client.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        println!("Authentication successful!\n");
        Ok(token.into_stored())
    }

    fn consent_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            AUTH_URL,
            urlencoding::encode(&self.client.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.scopes.join(" ")),
        )
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<StoredToken> {
        let mut response = self
            .agent
            .post(TOKEN_URL)
            .send_form([
                ("client_id", self.client.client_id.as_str()),
                ("client_secret", self.client.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Google omits the refresh token on refresh responses
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token.into_stored())
    }

    /// Load the persisted token. A missing or unreadable-as-JSON file yields
    /// `None` so the caller falls through to consent.
    fn load_token(&self) -> Result<Option<StoredToken>> {
        let content = match fs::read(&self.token_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read token file: {}", self.token_path.display())
                });
            }
        };

        match serde_json::from_slice(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(
                    "Ignoring invalid token file {}: {}",
                    self.token_path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    fn save_token(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.token_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.token_path, content)
            .with_context(|| format!("Failed to write token file: {}", self.token_path.display()))?;
        Ok(())
    }
}

impl AccessTokenSource for OAuthInstalledAuth {
    fn access_token(&self) -> Result<String> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let now = chrono::Utc::now().timestamp();
        if let Some(token) = current.as_ref()
            && token.is_fresh(now)
        {
            return Ok(token.access_token.clone());
        }

        let token = self.resolve_token()?;
        let access_token = token.access_token.clone();
        *current = Some(token);
        Ok(access_token)
    }
}

/// Outcome of a single loopback request
enum Callback {
    Code(String),
    Error(String),
    Unrelated,
}

/// Accept loopback connections until one carries `code` or `error`
fn wait_for_callback(listener: &TcpListener) -> Result<String> {
    loop {
        let (stream, _) = listener.accept().context("Failed to accept connection")?;
        match handle_callback(stream)? {
            Callback::Code(code) => return Ok(code),
            Callback::Error(err) => return Err(AuthError::ConsentDenied(err).into()),
            Callback::Unrelated => continue,
        }
    }
}

fn handle_callback(mut stream: TcpStream) -> Result<Callback> {
    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .context("Failed to read request")?;

    let callback = parse_callback_request(&request_line)?;

    let (status, body) = match &callback {
        Callback::Code(_) => ("200 OK", "Authentication successful! You can close this window."),
        Callback::Error(_) => ("400 Bad Request", "Authentication failed. Please try again."),
        Callback::Unrelated => ("404 Not Found", "Not found."),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    stream.write_all(response.as_bytes()).ok();

    Ok(callback)
}

/// Parse `GET /?code=...&scope=... HTTP/1.1`
fn parse_callback_request(request_line: &str) -> Result<Callback> {
    let path = request_line
        .split_whitespace()
        .nth(1)
        .ok_or(AuthError::MissingAuthorizationCode)?;
    let url = Url::parse(&format!("http://localhost{}", path))
        .context("Malformed OAuth callback request")?;

    let mut callback = Callback::Unrelated;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return Ok(Callback::Error(value.into_owned())),
            "code" => callback = Callback::Code(value.into_owned()),
            _ => {}
        }
    }
    Ok(callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_auth(token_path: PathBuf) -> OAuthInstalledAuth {
        OAuthInstalledAuth::new(
            OAuthClientSecret {
                client_id: "client.apps.googleusercontent.com".to_string(),
                client_secret: "secret".to_string(),
            },
            vec![
                "https://www.googleapis.com/auth/gmail.modify".to_string(),
                "https://www.googleapis.com/auth/spreadsheets".to_string(),
            ],
            token_path,
            crate::http::agent(Duration::from_secs(1)),
        )
    }

    #[test]
    fn test_parse_callback_code() {
        let cb = parse_callback_request("GET /?code=4%2F0Ab&scope=gmail HTTP/1.1\r\n").unwrap();
        assert!(matches!(cb, Callback::Code(code) if code == "4/0Ab"));
    }

    #[test]
    fn test_parse_callback_error() {
        let cb = parse_callback_request("GET /?error=access_denied HTTP/1.1\r\n").unwrap();
        assert!(matches!(cb, Callback::Error(err) if err == "access_denied"));
    }

    #[test]
    fn test_parse_callback_unrelated() {
        let cb = parse_callback_request("GET /favicon.ico HTTP/1.1\r\n").unwrap();
        assert!(matches!(cb, Callback::Unrelated));
    }

    #[test]
    fn test_parse_callback_malformed() {
        assert!(parse_callback_request("").is_err());
    }

    #[test]
    fn test_consent_url_contains_all_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let auth = test_auth(dir.path().join("token.json"));
        let url = auth.consent_url("http://localhost:9000");

        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains(&*urlencoding::encode(
            "https://www.googleapis.com/auth/gmail.modify https://www.googleapis.com/auth/spreadsheets"
        )));
    }

    #[test]
    fn test_fresh_token_is_reused_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let auth = test_auth(path.clone());

        let stored = StoredToken {
            access_token: "ya29.cached".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        };
        auth.save_token(&stored).unwrap();
        assert!(path.exists());

        assert_eq!(auth.access_token().unwrap(), "ya29.cached");
    }

    #[test]
    fn test_missing_token_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let auth = test_auth(dir.path().join("token.json"));
        assert!(auth.load_token().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_token_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, b"\x80\x04not json").unwrap();
        let auth = test_auth(path);
        assert!(auth.load_token().unwrap().is_none());
    }

    #[test]
    fn test_token_freshness_buffer() {
        let now = 1_700_000_000;
        let token = |expires_at| StoredToken {
            access_token: String::new(),
            refresh_token: None,
            expires_at,
        };
        assert!(token(Some(now + 3600)).is_fresh(now));
        assert!(!token(Some(now + 60)).is_fresh(now));
        assert!(!token(None).is_fresh(now));
    }
}
