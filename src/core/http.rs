//! HTTP client utilities.
//!
//! Provides the shared reqwest client used by the usage API and token
//! refresh clients. Every request inherits the client-level timeout so a
//! non-responding upstream resolves to an error instead of hanging the
//! polling loop.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::error::{QuotapaneError, Result};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("quotapane/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| QuotapaneError::Other(anyhow::anyhow!("failed to build HTTP client: {e}")))
}

/// Classify a transport-level reqwest failure.
///
/// DNS failures, timeouts, and connection resets never reach the server, so
/// they are reported as an API error with status 0.
pub fn classify_transport_error(err: &reqwest::Error) -> QuotapaneError {
    let message = if err.is_timeout() {
        format!("request timed out after {}s", DEFAULT_TIMEOUT.as_secs())
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    QuotapaneError::Api { status: 0, message }
}
