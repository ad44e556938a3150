//! Credential resolution across local stores.
//!
//! Credentials for the OAuth usage API are produced by other tools and may
//! live in several places:
//!
//! 1. **OS credential store** (service `"Claude Code-credentials"`,
//!    read-only here),
//! 2. **Claude CLI file** `~/.claude/.credentials.json`:
//!
//!    ```json
//!    { "claudeAiOauth": { "accessToken": "...", "refreshToken": "...",
//!      "expiresAt": 1735000000000, "scopes": ["user:profile"] } }
//!    ```
//!
//! 3. **opencode auth file** `~/.local/share/opencode/auth.json`:
//!
//!    ```json
//!    { "anthropic": { "type": "oauth", "access": "...", "refresh": "...",
//!      "expires": 1735000000000 } }
//!    ```
//!
//! Resolution walks a fixed priority list. A source whose backing file or
//! entry does not exist is skipped; a source that exists but fails to parse
//! is a hard error for that source and stays visible in the aggregated
//! failure. A test-only override file (`access_token` / `refresh_token` /
//! `expires_at`) is activated exclusively through [`CredentialStore::with_override`],
//! never through the default chain.

pub mod refresh;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{QuotapaneError, Result};

/// Required structural prefix for Anthropic OAuth access tokens. Entries
/// without it are decoys or belong to some other tool.
pub const ACCESS_TOKEN_PREFIX: &str = "sk-ant-";

/// Keychain service name used by the Claude CLI.
const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";

/// Tokens within this margin of expiry are treated as already expired.
const EXPIRY_MARGIN_SECS: i64 = 5 * 60;

// =============================================================================
// Credential Record
// =============================================================================

/// A resolved OAuth credential. Replaced wholesale on refresh or reload,
/// never partially updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl CredentialRecord {
    /// True when the token expires within the refresh margin. A record
    /// without expiry information is assumed valid.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|t| t <= Utc::now() + chrono::Duration::seconds(EXPIRY_MARGIN_SECS))
    }
}

// =============================================================================
// Credential Source
// =============================================================================

/// An enumerated credential origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Secure OS credential store (read-only).
    Keychain,
    /// `~/.claude/.credentials.json`.
    ClaudeCli,
    /// `~/.local/share/opencode/auth.json`.
    OpenCode,
    /// Explicit override file, for tests.
    Override(PathBuf),
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keychain => write!(f, "keychain"),
            Self::ClaudeCli => write!(f, "claude-cli"),
            Self::OpenCode => write!(f, "opencode"),
            Self::Override(path) => write!(f, "override ({})", path.display()),
        }
    }
}

/// Per-source read outcome. "Not found" lets resolution continue; a
/// malformed source is a hard error recorded in diagnostics.
#[derive(Debug)]
enum SourceError {
    NotFound,
    Malformed(String),
}

// =============================================================================
// Credential Store
// =============================================================================

/// Resolves and persists credentials across the known sources.
pub struct CredentialStore {
    sources: Vec<CredentialSource>,
    home: PathBuf,
}

impl CredentialStore {
    /// Store with the real resolution chain rooted at the user's home.
    #[must_use]
    pub fn new() -> Self {
        let home = directories::BaseDirs::new()
            .map_or_else(|| PathBuf::from("."), |d| d.home_dir().to_path_buf());
        Self {
            sources: vec![
                CredentialSource::Keychain,
                CredentialSource::ClaudeCli,
                CredentialSource::OpenCode,
            ],
            home,
        }
    }

    /// Store that consults only the given override file. The real chain is
    /// never touched.
    #[must_use]
    pub fn with_override(path: impl Into<PathBuf>) -> Self {
        Self {
            sources: vec![CredentialSource::Override(path.into())],
            home: PathBuf::from("."),
        }
    }

    /// Store with the file-based chain rooted at a custom home directory.
    /// The OS credential store is skipped so resolution stays hermetic.
    #[must_use]
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            sources: vec![CredentialSource::ClaudeCli, CredentialSource::OpenCode],
            home: home.into(),
        }
    }

    /// The resolution chain, in priority order.
    #[must_use]
    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    /// Resolve a credential.
    ///
    /// Walks the chain in priority order, or tries only `preferred` when
    /// given. The winning source is returned alongside the record so a
    /// refreshed credential can be written back to where it came from.
    ///
    /// # Errors
    ///
    /// - [`QuotapaneError::CredentialsMalformed`] when `preferred` exists
    ///   but cannot be parsed or validated.
    /// - [`QuotapaneError::NoUsableCredentials`] when no source yields a
    ///   valid record; the details string lists every source's outcome,
    ///   keeping "not found" and parse failures distinguishable.
    pub fn load(
        &self,
        preferred: Option<&CredentialSource>,
    ) -> Result<(CredentialRecord, CredentialSource)> {
        if let Some(source) = preferred {
            return match self.try_source(source) {
                Ok(record) => Ok((record, source.clone())),
                Err(SourceError::NotFound) => Err(QuotapaneError::NoUsableCredentials {
                    details: format!("{source}: not found"),
                }),
                Err(SourceError::Malformed(reason)) => Err(QuotapaneError::CredentialsMalformed {
                    source_name: source.to_string(),
                    reason,
                }),
            };
        }

        let mut outcomes = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match self.try_source(source) {
                Ok(record) => {
                    tracing::debug!(%source, "resolved credentials");
                    return Ok((record, source.clone()));
                }
                Err(SourceError::NotFound) => {
                    tracing::debug!(%source, "credentials not found");
                    outcomes.push(format!("{source}: not found"));
                }
                Err(SourceError::Malformed(reason)) => {
                    tracing::warn!(%source, %reason, "credentials malformed");
                    outcomes.push(format!("{source}: {reason}"));
                }
            }
        }

        Err(QuotapaneError::NoUsableCredentials {
            details: outcomes.join("; "),
        })
    }

    /// Persist a refreshed record into its original source's schema,
    /// merging so sibling fields in the same file survive.
    ///
    /// Returns `false` on any I/O failure and for the read-only keychain
    /// source. Callers must treat `false` as non-fatal: the in-memory token
    /// still works, it just will not be visible on the next run.
    pub fn write_back(&self, source: &CredentialSource, record: &CredentialRecord) -> bool {
        let result = match source {
            CredentialSource::Keychain => {
                tracing::debug!("keychain source is read-only; skipping write-back");
                return false;
            }
            CredentialSource::ClaudeCli => write_claude_file(&self.claude_cli_path(), record),
            CredentialSource::OpenCode => write_opencode_file(&self.opencode_path(), record),
            CredentialSource::Override(path) => write_override_file(path, record),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%source, error = %e, "credential write-back failed");
                false
            }
        }
    }

    fn claude_cli_path(&self) -> PathBuf {
        self.home.join(".claude").join(".credentials.json")
    }

    fn opencode_path(&self) -> PathBuf {
        self.home
            .join(".local")
            .join("share")
            .join("opencode")
            .join("auth.json")
    }

    fn try_source(&self, source: &CredentialSource) -> std::result::Result<CredentialRecord, SourceError> {
        match source {
            CredentialSource::Keychain => read_keychain(),
            CredentialSource::ClaudeCli => read_claude_file(&self.claude_cli_path()),
            CredentialSource::OpenCode => read_opencode_file(&self.opencode_path()),
            CredentialSource::Override(path) => read_override_file(path),
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Source Schemas
// =============================================================================

/// Root of `~/.claude/.credentials.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaudeCredentialsFile {
    #[serde(default)]
    claude_ai_oauth: Option<ClaudeOauthEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaudeOauthEntry {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<EpochOrIso>,
    #[serde(default)]
    scopes: Option<Vec<String>>,
}

/// `expiresAt` appears both as epoch-milliseconds and as an ISO-8601 string
/// in the wild, depending on which tool last wrote the file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpochOrIso {
    Millis(i64),
    Iso(String),
}

impl EpochOrIso {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Iso(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Per-provider entry in opencode's `auth.json`.
#[derive(Debug, Deserialize)]
struct OpenCodeEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    access: String,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    expires: Option<i64>,
}

/// Test-only override file.
#[derive(Debug, Deserialize)]
struct OverrideFile {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

// =============================================================================
// Source Readers
// =============================================================================

fn read_keychain() -> std::result::Result<CredentialRecord, SourceError> {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &user) else {
        return Err(SourceError::NotFound);
    };

    match entry.get_password() {
        Ok(secret) => parse_claude_payload(&secret),
        Err(keyring::Error::NoEntry) => Err(SourceError::NotFound),
        Err(e) => {
            // No usable credential store on this platform; not a hard error.
            tracing::debug!(error = %e, "keychain unavailable");
            Err(SourceError::NotFound)
        }
    }
}

fn read_claude_file(path: &Path) -> std::result::Result<CredentialRecord, SourceError> {
    let content = read_existing(path)?;
    parse_claude_payload(&content)
}

/// Parse the Claude CLI JSON payload, accepting both the wrapped file form
/// and the bare entry the keychain sometimes holds.
fn parse_claude_payload(content: &str) -> std::result::Result<CredentialRecord, SourceError> {
    let entry = match serde_json::from_str::<ClaudeCredentialsFile>(content) {
        Ok(file) => match file.claude_ai_oauth {
            Some(entry) => entry,
            // Valid JSON, but the entry we need is absent.
            None => match serde_json::from_str::<ClaudeOauthEntry>(content) {
                Ok(entry) => entry,
                Err(_) => return Err(SourceError::NotFound),
            },
        },
        Err(e) => return Err(SourceError::Malformed(format!("invalid JSON: {e}"))),
    };

    validated(CredentialRecord {
        access_token: entry.access_token,
        refresh_token: entry.refresh_token,
        expires_at: entry.expires_at.as_ref().and_then(EpochOrIso::to_datetime),
        scopes: entry.scopes.unwrap_or_default(),
    })
}

fn read_opencode_file(path: &Path) -> std::result::Result<CredentialRecord, SourceError> {
    let content = read_existing(path)?;
    let root: Value = serde_json::from_str(&content)
        .map_err(|e| SourceError::Malformed(format!("invalid JSON: {e}")))?;

    let Some(entry_value) = root.get("anthropic") else {
        return Err(SourceError::NotFound);
    };

    let entry: OpenCodeEntry = serde_json::from_value(entry_value.clone())
        .map_err(|e| SourceError::Malformed(format!("invalid anthropic entry: {e}")))?;

    if entry.kind.as_deref().is_some_and(|k| k != "oauth") {
        return Err(SourceError::Malformed(format!(
            "anthropic entry has type {:?}, expected \"oauth\"",
            entry.kind.as_deref().unwrap_or_default()
        )));
    }

    validated(CredentialRecord {
        access_token: entry.access,
        refresh_token: entry.refresh,
        expires_at: entry
            .expires
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        scopes: Vec::new(),
    })
}

fn read_override_file(path: &Path) -> std::result::Result<CredentialRecord, SourceError> {
    let content = read_existing(path)?;
    let file: OverrideFile = serde_json::from_str(&content)
        .map_err(|e| SourceError::Malformed(format!("invalid JSON: {e}")))?;

    validated(CredentialRecord {
        access_token: file.access_token,
        refresh_token: file.refresh_token,
        expires_at: file
            .expires_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        scopes: Vec::new(),
    })
}

fn read_existing(path: &Path) -> std::result::Result<String, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound);
    }
    // The file exists; failing to read it is a hard error, not "not found".
    fs::read_to_string(path).map_err(|e| SourceError::Malformed(format!("unreadable: {e}")))
}

/// Reject records whose access token lacks the required structural prefix.
fn validated(record: CredentialRecord) -> std::result::Result<CredentialRecord, SourceError> {
    if record.access_token.starts_with(ACCESS_TOKEN_PREFIX) {
        Ok(record)
    } else {
        Err(SourceError::Malformed(format!(
            "access token missing required `{ACCESS_TOKEN_PREFIX}` prefix"
        )))
    }
}

// =============================================================================
// Source Writers
// =============================================================================

fn write_claude_file(path: &Path, record: &CredentialRecord) -> Result<()> {
    let mut root = load_json_object(path);
    let mut entry = match root.remove("claudeAiOauth") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    entry.insert("accessToken".to_string(), json!(record.access_token));
    set_or_remove(&mut entry, "refreshToken", record.refresh_token.as_ref());
    set_or_remove(
        &mut entry,
        "expiresAt",
        record.expires_at.map(|t| t.timestamp_millis()).as_ref(),
    );
    entry.insert("scopes".to_string(), json!(record.scopes));

    root.insert("claudeAiOauth".to_string(), Value::Object(entry));
    write_json_object(path, &root)
}

fn write_opencode_file(path: &Path, record: &CredentialRecord) -> Result<()> {
    let mut root = load_json_object(path);
    let mut entry = match root.remove("anthropic") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    entry.insert("type".to_string(), json!("oauth"));
    entry.insert("access".to_string(), json!(record.access_token));
    set_or_remove(&mut entry, "refresh", record.refresh_token.as_ref());
    set_or_remove(
        &mut entry,
        "expires",
        record.expires_at.map(|t| t.timestamp_millis()).as_ref(),
    );

    root.insert("anthropic".to_string(), Value::Object(entry));
    write_json_object(path, &root)
}

fn write_override_file(path: &Path, record: &CredentialRecord) -> Result<()> {
    let mut root = load_json_object(path);
    root.insert("access_token".to_string(), json!(record.access_token));
    set_or_remove(&mut root, "refresh_token", record.refresh_token.as_ref());
    set_or_remove(
        &mut root,
        "expires_at",
        record.expires_at.map(|t| t.timestamp_millis()).as_ref(),
    );
    write_json_object(path, &root)
}

/// Read an existing JSON object for merge, falling back to an empty one.
fn load_json_object(path: &Path) -> Map<String, Value> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}

fn write_json_object(path: &Path, root: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(&Value::Object(root.clone()))?;
    fs::write(path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    Ok(())
}

fn set_or_remove<T: serde::Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<&T>) {
    match value {
        Some(v) => {
            map.insert(key.to_string(), json!(v));
        }
        None => {
            map.remove(key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_payload_parses_wrapped_form() {
        let json = r#"{
            "claudeAiOauth": {
                "accessToken": "sk-ant-oat01-abc",
                "refreshToken": "sk-ant-ort01-def",
                "expiresAt": 1735000000000,
                "scopes": ["user:profile", "user:inference"]
            }
        }"#;

        let record = parse_claude_payload(json).expect("record");
        assert_eq!(record.access_token, "sk-ant-oat01-abc");
        assert_eq!(record.refresh_token.as_deref(), Some("sk-ant-ort01-def"));
        assert!(record.expires_at.is_some());
        assert_eq!(record.scopes.len(), 2);
    }

    #[test]
    fn claude_payload_parses_bare_entry() {
        let json = r#"{ "accessToken": "sk-ant-oat01-abc" }"#;
        let record = parse_claude_payload(json).expect("record");
        assert_eq!(record.access_token, "sk-ant-oat01-abc");
        assert!(record.refresh_token.is_none());
    }

    #[test]
    fn claude_payload_accepts_iso_expiry() {
        let json = r#"{
            "claudeAiOauth": {
                "accessToken": "sk-ant-oat01-abc",
                "expiresAt": "2026-08-07T15:00:00Z"
            }
        }"#;
        let record = parse_claude_payload(json).expect("record");
        let expires = record.expires_at.expect("expiry");
        assert_eq!(expires.timestamp(), 1_786_114_800);
    }

    #[test]
    fn claude_payload_rejects_invalid_json() {
        let err = parse_claude_payload("{ not json").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn claude_payload_rejects_wrong_prefix() {
        let json = r#"{ "claudeAiOauth": { "accessToken": "ghp_decoy" } }"#;
        match parse_claude_payload(json) {
            Err(SourceError::Malformed(reason)) => assert!(reason.contains("sk-ant-")),
            other => panic!("expected malformed, got {:?}", other.map(|r| r.access_token)),
        }
    }

    #[test]
    fn epoch_or_iso_millis() {
        let ts = EpochOrIso::Millis(1_735_000_000_000);
        assert_eq!(ts.to_datetime().expect("datetime").timestamp(), 1_735_000_000);
    }

    #[test]
    fn epoch_or_iso_bad_string_is_none() {
        assert!(EpochOrIso::Iso("not a date".to_string()).to_datetime().is_none());
    }

    #[test]
    fn record_expiry_margin() {
        let fresh = CredentialRecord {
            access_token: "sk-ant-x".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            scopes: Vec::new(),
        };
        assert!(!fresh.is_expired());

        let expiring = CredentialRecord {
            expires_at: Some(Utc::now() + chrono::Duration::seconds(60)),
            ..fresh.clone()
        };
        assert!(expiring.is_expired());

        let no_expiry = CredentialRecord {
            expires_at: None,
            ..fresh
        };
        assert!(!no_expiry.is_expired());
    }

    #[test]
    fn default_chain_order_is_fixed() {
        let store = CredentialStore::new();
        assert_eq!(
            store.sources(),
            &[
                CredentialSource::Keychain,
                CredentialSource::ClaudeCli,
                CredentialSource::OpenCode,
            ]
        );
    }

    #[test]
    fn override_store_has_single_source() {
        let store = CredentialStore::with_override("/tmp/creds.json");
        assert_eq!(store.sources().len(), 1);
        assert!(matches!(store.sources()[0], CredentialSource::Override(_)));
    }

    #[test]
    fn source_display_labels() {
        assert_eq!(CredentialSource::Keychain.to_string(), "keychain");
        assert_eq!(CredentialSource::ClaudeCli.to_string(), "claude-cli");
        assert_eq!(CredentialSource::OpenCode.to_string(), "opencode");
    }
}
