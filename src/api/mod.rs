//! Authenticated client for the OAuth usage and profile endpoints.
//!
//! The client owns the retry-once-on-401 policy: the access token can
//! expire mid-session, and a *different* process (a login flow, another
//! monitor) may already have refreshed and persisted a new one. Re-reading
//! the credential store before giving up is cheaper and more correct than
//! performing our own refresh exchange on that path; self-refresh happens
//! only at load time for a token that is already known to be expired.

use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::http::{DEFAULT_TIMEOUT, build_client, classify_transport_error};
use crate::core::models::{Profile, Summary, UsageSnapshot};
use crate::credentials::refresh::{TOKEN_ENDPOINT, TokenRefreshClient};
use crate::credentials::{CredentialRecord, CredentialSource, CredentialStore};
use crate::error::{QuotapaneError, Result};

/// Anthropic API base URL.
pub const API_BASE: &str = "https://api.anthropic.com";

/// Usage windows endpoint path.
const USAGE_PATH: &str = "/api/oauth/usage";

/// Account/organization profile endpoint path.
const PROFILE_PATH: &str = "/api/oauth/profile";

/// Beta feature header required by the OAuth endpoints.
const OAUTH_BETA_HEADER: &str = "oauth-2025-04-20";

type CachedCredential = (CredentialRecord, CredentialSource);

/// Authenticated client for the two read endpoints.
pub struct UsageClient {
    http: reqwest::Client,
    base_url: String,
    store: CredentialStore,
    refresh: TokenRefreshClient,
    cached: Mutex<Option<CachedCredential>>,
}

impl UsageClient {
    /// Client against the production endpoints.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(store: CredentialStore) -> Result<Self> {
        Self::with_endpoints(store, API_BASE, TOKEN_ENDPOINT)
    }

    /// Client against custom endpoints (tests).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn with_endpoints(
        store: CredentialStore,
        base_url: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Result<Self> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            http: build_client(DEFAULT_TIMEOUT)?,
            base_url,
            store,
            refresh: TokenRefreshClient::with_endpoint(token_endpoint)?,
            cached: Mutex::new(None),
        })
    }

    /// Fetch the usage windows snapshot.
    ///
    /// # Errors
    ///
    /// Returns a typed failure: credentials, authentication, rate-limit, or
    /// API errors. Never panics across this boundary.
    pub async fn get_usage(&self) -> Result<UsageSnapshot> {
        self.get_json(USAGE_PATH).await
    }

    /// Fetch the account/organization profile.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::get_usage`].
    pub async fn get_profile(&self) -> Result<Profile> {
        self.get_json(PROFILE_PATH).await
    }

    /// Fetch usage and profile in parallel. The first failure wins and the
    /// other request is discarded.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::get_usage`].
    pub async fn get_summary(&self) -> Result<Summary> {
        let (usage, profile) = tokio::try_join!(self.get_usage(), self.get_profile())?;
        Ok(Summary { usage, profile })
    }

    /// Drop the cached credential so the next request re-resolves.
    pub fn invalidate_credential(&self) {
        *self.cache() = None;
    }

    /// Seed the in-memory credential cache, bypassing the store.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn prime_credential(&self, record: CredentialRecord, source: CredentialSource) {
        *self.cache() = Some((record, source));
    }

    fn cache(&self) -> MutexGuard<'_, Option<CachedCredential>> {
        // The guard is only held for copies, never across an await.
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the credential for the next request: cache, then store, with
    /// a refresh exchange (persisted via write-back) for a token that is
    /// already expired at load time.
    async fn ensure_credential(&self) -> Result<CachedCredential> {
        if let Some(cached) = self.cache().clone() {
            return Ok(cached);
        }

        let (mut record, source) = self.store.load(None)?;

        if record.is_expired() {
            if let Some(refresh_token) = record.refresh_token.clone() {
                match self.refresh.refresh(&refresh_token).await {
                    Ok(fresh) => {
                        if !self.store.write_back(&source, &fresh) {
                            tracing::warn!(
                                "refreshed token not persisted; it stays valid for this process only"
                            );
                        }
                        record = fresh;
                    }
                    Err(e) => {
                        // The stored token may still be accepted; if not,
                        // the 401 path re-reads the store.
                        tracing::warn!(error = %e, "token refresh failed; trying stored token");
                    }
                }
            }
        }

        *self.cache() = Some((record.clone(), source.clone()));
        Ok((record, source))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (record, _source) = self.ensure_credential().await?;

        match self.authed_get(path, &record.access_token).await {
            Err(QuotapaneError::AuthRejected { message }) => {
                tracing::debug!(path, "token rejected; re-reading credential store");
                self.invalidate_credential();

                let (fresh, source) = self.store.load(None)?;
                if fresh.access_token == record.access_token {
                    // The store still holds the rejected token; a retry
                    // would loop against a server that always rejects it.
                    return Err(QuotapaneError::AuthRejected { message });
                }

                *self.cache() = Some((fresh.clone(), source));
                self.authed_get(path, &fresh.access_token).await
            }
            other => other,
        }
    }

    async fn authed_get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("anthropic-beta", OAUTH_BETA_HEADER)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(QuotapaneError::AuthRejected {
                message: api_error_message(status.as_u16(), &body),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(QuotapaneError::RateLimited {
                message: api_error_message(status.as_u16(), &body),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuotapaneError::Api {
                status: status.as_u16(),
                message: api_error_message(status.as_u16(), &body),
            });
        }

        response.json::<T>().await.map_err(|e| QuotapaneError::Api {
            status: status.as_u16(),
            message: format!("failed to parse response: {e}"),
        })
    }
}

/// Extract a readable message from an API error body. Anthropic wraps
/// errors as `{"error": {"type": ..., "message": ...}}`; OAuth-style bodies
/// use `error_description`/`error`. Malformed bodies fall back to the raw
/// text or the bare status.
fn api_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error_description").and_then(Value::as_str))
            .or_else(|| value.get("error").and_then(Value::as_str))
        {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        let mut message: String = trimmed.chars().take(200).collect();
        if message.len() < trimmed.len() {
            message.push('\u{2026}');
        }
        message
    }
}
