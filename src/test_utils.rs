//! Test utilities for quotapane.
//!
//! Available in test builds or via the `test-utils` feature so integration
//! tests can share fixture builders.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::credentials::{CredentialRecord, CredentialStore};

/// A temporary home directory hosting credential files.
pub struct TempHome {
    dir: TempDir,
}

impl TempHome {
    /// Create an empty temporary home.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp home"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A credential store rooted at this home (file sources only).
    #[must_use]
    pub fn store(&self) -> CredentialStore {
        CredentialStore::with_home(self.path())
    }

    #[must_use]
    pub fn claude_credentials_path(&self) -> PathBuf {
        self.path().join(".claude").join(".credentials.json")
    }

    #[must_use]
    pub fn opencode_auth_path(&self) -> PathBuf {
        self.path()
            .join(".local")
            .join("share")
            .join("opencode")
            .join("auth.json")
    }

    /// Write a well-formed Claude CLI credentials file for `token`.
    ///
    /// # Panics
    ///
    /// Panics on I/O failure.
    pub fn write_claude_credentials(&self, token: &str) {
        self.write_claude_credentials_json(
            &json!({
                "claudeAiOauth": {
                    "accessToken": token,
                    "refreshToken": "sk-ant-ort01-refresh",
                    "expiresAt": future_epoch_millis(),
                    "scopes": ["user:profile", "user:inference"],
                }
            })
            .to_string(),
        );
    }

    /// Write raw content to the Claude CLI credentials path.
    ///
    /// # Panics
    ///
    /// Panics on I/O failure.
    pub fn write_claude_credentials_json(&self, content: &str) {
        write_file(&self.claude_credentials_path(), content);
    }

    /// Write a well-formed opencode auth file for `token`.
    ///
    /// # Panics
    ///
    /// Panics on I/O failure.
    pub fn write_opencode_auth(&self, token: &str) {
        self.write_opencode_auth_json(
            &json!({
                "anthropic": {
                    "type": "oauth",
                    "access": token,
                    "refresh": "sk-ant-ort01-refresh",
                    "expires": future_epoch_millis(),
                }
            })
            .to_string(),
        );
    }

    /// Write raw content to the opencode auth path.
    ///
    /// # Panics
    ///
    /// Panics on I/O failure.
    pub fn write_opencode_auth_json(&self, content: &str) {
        write_file(&self.opencode_auth_path(), content);
    }

    /// Read a credential file back as parsed JSON.
    ///
    /// # Panics
    ///
    /// Panics if the file is missing or not JSON.
    #[must_use]
    pub fn read_json(&self, path: &Path) -> Value {
        let content = fs::read_to_string(path).expect("read credential file");
        serde_json::from_str(&content).expect("parse credential file")
    }
}

impl Default for TempHome {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write file");
}

/// Epoch milliseconds comfortably in the future.
#[must_use]
pub fn future_epoch_millis() -> i64 {
    (Utc::now() + Duration::hours(8)).timestamp_millis()
}

/// Epoch milliseconds comfortably in the past.
#[must_use]
pub fn past_epoch_millis() -> i64 {
    (Utc::now() - Duration::hours(8)).timestamp_millis()
}

/// A credential record for `token` with a future expiry.
#[must_use]
pub fn test_record(token: &str) -> CredentialRecord {
    CredentialRecord {
        access_token: token.to_string(),
        refresh_token: Some("sk-ant-ort01-refresh".to_string()),
        expires_at: Some(Utc::now() + Duration::hours(8)),
        scopes: vec!["user:profile".to_string()],
    }
}

/// Usage endpoint response body with all four windows populated.
#[must_use]
pub fn sample_usage_body() -> Value {
    json!({
        "five_hour": { "utilization": 44.0, "resets_at": "2026-08-07T18:12:00Z" },
        "seven_day": { "utilization": 12.5, "resets_at": "2026-08-12T00:00:00Z" },
        "seven_day_oauth_apps": null,
        "seven_day_opus": { "utilization": 3.0, "resets_at": "2026-08-12T00:00:00Z" },
    })
}

/// Profile endpoint response body.
#[must_use]
pub fn sample_profile_body() -> Value {
    json!({
        "account": {
            "email_address": "user@example.com",
            "full_name": "A User",
            "has_claude_max": true,
        },
        "organization": {
            "name": "Example Org",
            "organization_type": "claude_max",
            "billing_type": "stripe",
        },
    })
}
