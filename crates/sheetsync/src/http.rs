//! Shared HTTP agent construction

use std::time::Duration;

/// Build a blocking HTTP agent whose every call is bounded by `timeout`.
///
/// Non-2xx responses surface as `ureq::Error::StatusCode`.
pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Format an `Authorization` header value
pub(crate) fn bearer(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}
