//! OAuth token refresh.
//!
//! Exchanges a refresh token for a new access token against the fixed token
//! endpoint. The caller persists the result through
//! [`CredentialStore::write_back`](super::CredentialStore::write_back).

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::http::{DEFAULT_TIMEOUT, build_client};
use crate::error::{QuotapaneError, Result};

use super::CredentialRecord;

/// Fixed OAuth token endpoint.
pub const TOKEN_ENDPOINT: &str = "https://platform.claude.com/v1/oauth/token";

/// OAuth client identifier of the Claude CLI, whose tokens we refresh.
pub const OAUTH_CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";

/// Successful token endpoint response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Client for the OAuth token endpoint.
pub struct TokenRefreshClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TokenRefreshClient {
    /// Client against the production token endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        Self::with_endpoint(TOKEN_ENDPOINT)
    }

    /// Client against a custom endpoint (tests).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_client(DEFAULT_TIMEOUT)?,
            endpoint: endpoint.into(),
        })
    }

    /// Exchange a refresh token for a fresh credential record.
    ///
    /// # Errors
    ///
    /// - [`QuotapaneError::RefreshNetwork`] when the endpoint is unreachable;
    ///   the caller may retry later with the same refresh token.
    /// - [`QuotapaneError::RefreshRejected`] when the server answered non-2xx;
    ///   the refresh token is no longer good and the user must re-authenticate.
    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialRecord> {
        let body = json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "client_id": OAUTH_CLIENT_ID,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| QuotapaneError::RefreshNetwork {
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| QuotapaneError::RefreshNetwork {
                message: format!("failed to read refresh response: {e}"),
            })?;

        if !status.is_success() {
            return Err(QuotapaneError::RefreshRejected {
                message: error_message_from_body(status.as_u16(), &text),
            });
        }

        let parsed: RefreshResponse =
            serde_json::from_str(&text).map_err(|e| QuotapaneError::RefreshRejected {
                message: format!("unparseable token response: {e}"),
            })?;

        tracing::info!("access token refreshed");

        Ok(CredentialRecord {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_at: parsed
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes: parsed
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

/// Extract a human-readable message from an OAuth error body:
/// `error_description`, then `error`, then a generic fallback. Malformed
/// bodies never cause a secondary failure.
fn error_message_from_body(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(description) = value.get("error_description").and_then(Value::as_str) {
            return description.to_string();
        }
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return error.to_string();
        }
    }
    format!("token endpoint returned HTTP {status}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_description() {
        let body = r#"{"error": "invalid_grant", "error_description": "Refresh token revoked"}"#;
        assert_eq!(error_message_from_body(400, body), "Refresh token revoked");
    }

    #[test]
    fn error_message_falls_back_to_error_field() {
        let body = r#"{"error": "invalid_grant"}"#;
        assert_eq!(error_message_from_body(400, body), "invalid_grant");
    }

    #[test]
    fn error_message_survives_malformed_body() {
        assert_eq!(
            error_message_from_body(502, "<html>bad gateway</html>"),
            "token endpoint returned HTTP 502"
        );
        assert_eq!(
            error_message_from_body(500, ""),
            "token endpoint returned HTTP 500"
        );
    }

    #[test]
    fn error_message_ignores_non_string_fields() {
        let body = r#"{"error": {"nested": true}}"#;
        assert_eq!(
            error_message_from_body(400, body),
            "token endpoint returned HTTP 400"
        );
    }
}
