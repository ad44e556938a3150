//! Error types for quotapane.
//!
//! Uses `thiserror` for structured error types shared by every component.
//!
//! ## Error Taxonomy
//!
//! - **Credentials**: no usable credential could be resolved from any source,
//!   or a source existed but was malformed. User-actionable: re-authenticate.
//! - **Authentication**: the server rejected the token even after the one
//!   permitted store re-read. User-actionable: re-authenticate.
//! - **RateLimit**: HTTP 429. Transient; the next poll retries.
//! - **Api**: any other upstream failure, including transport failures
//!   (reported with status 0). Treated uniformly as "retry on next poll".
//! - **Pane**: a tmux command or pane-move protocol failure.
//! - **Internal**: I/O, JSON, and unclassified errors.

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and user guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// No usable credential found, or a credential source was malformed.
    Credentials,
    /// The server rejected the token (after retry, or at the token endpoint).
    Authentication,
    /// HTTP 429 from the usage API.
    RateLimit,
    /// Other upstream failures, including transport errors (status 0).
    Api,
    /// tmux command or pane-move failures.
    Pane,
    /// Internal errors (I/O, JSON, bugs).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Credentials => "Credentials error",
            Self::Authentication => "Authentication error",
            Self::RateLimit => "Rate limit error",
            Self::Api => "API error",
            Self::Pane => "Pane error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Error Type
// =============================================================================

/// Main error type for quotapane operations.
#[derive(Error, Debug)]
pub enum QuotapaneError {
    // ==========================================================================
    // Credential errors (Category: Credentials)
    // ==========================================================================
    /// No source yielded a usable credential. `details` lists the per-source
    /// outcomes, including any parse failures, so "not found" and "malformed"
    /// stay distinguishable in diagnostics.
    #[error("no usable Claude credentials ({details})")]
    NoUsableCredentials { details: String },

    /// A specific source exists but could not be parsed or failed validation.
    #[error("malformed credentials in {source_name}: {reason}")]
    CredentialsMalformed { source_name: String, reason: String },

    // ==========================================================================
    // Authentication errors (Category: Authentication)
    // ==========================================================================
    /// The usage API rejected the token even after one store re-read.
    #[error("authentication rejected: {message}")]
    AuthRejected { message: String },

    /// The token endpoint rejected the refresh token.
    #[error("token refresh rejected: {message}")]
    RefreshRejected { message: String },

    /// The token endpoint was unreachable. Distinct from `RefreshRejected`
    /// so callers can suggest "retry later" instead of "re-authenticate".
    #[error("token refresh failed: {message}")]
    RefreshNetwork { message: String },

    // ==========================================================================
    // Upstream errors (Category: RateLimit / Api)
    // ==========================================================================
    /// HTTP 429 from the usage API.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Any other non-2xx response, or a transport failure (status 0).
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ==========================================================================
    // Pane errors (Category: Pane)
    // ==========================================================================
    /// A tmux command exited non-zero or produced unusable output.
    #[error("tmux: {message}")]
    Tmux { message: String },

    /// A pane move failed partway through. `restored` records whether the
    /// pane was re-attached at its original position.
    #[error("pane move failed at {step}: {message}")]
    PaneMove {
        step: String,
        message: String,
        restored: bool,
    },

    // ==========================================================================
    // Internal errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QuotapaneError {
    /// Returns the error category for classification and user guidance.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NoUsableCredentials { .. } | Self::CredentialsMalformed { .. } => {
                ErrorCategory::Credentials
            }

            Self::AuthRejected { .. }
            | Self::RefreshRejected { .. }
            | Self::RefreshNetwork { .. } => ErrorCategory::Authentication,

            Self::RateLimited { .. } => ErrorCategory::RateLimit,

            Self::Api { .. } => ErrorCategory::Api,

            Self::Tmux { .. } | Self::PaneMove { .. } => ErrorCategory::Pane,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns whether the next poll cycle may reasonably retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Api { .. } | Self::RefreshNetwork { .. }
        )
    }

    /// User-facing message for the display pane.
    ///
    /// Credential and authentication failures render an actionable
    /// instruction rather than raw HTTP bodies; everything else renders the
    /// server's message, truncated to fit a pane.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoUsableCredentials { .. } => {
                "no Claude credentials found; run `claude login` or `opencode auth login`"
                    .to_string()
            }
            Self::CredentialsMalformed { source_name: source, .. } => {
                format!("credentials in {source} are malformed; re-run `claude login`")
            }
            Self::AuthRejected { .. } | Self::RefreshRejected { .. } => {
                "authentication expired; re-run `claude login`".to_string()
            }
            Self::RefreshNetwork { .. } => "token refresh unreachable; retrying".to_string(),
            Self::RateLimited { .. } => "rate limited; retrying on next poll".to_string(),
            other => truncate_message(&other.to_string(), MAX_DISPLAY_MESSAGE),
        }
    }
}

/// Widest message the display pane will be asked to render.
const MAX_DISPLAY_MESSAGE: usize = 120;

/// Truncate a message to `max` characters, appending an ellipsis.
fn truncate_message(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        return message.to_string();
    }
    let truncated: String = message.chars().take(max.saturating_sub(1)).collect();
    format!("{truncated}\u{2026}")
}

/// Result type alias for quotapane operations.
pub type Result<T> = std::result::Result<T, QuotapaneError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_have_correct_category() {
        let err = QuotapaneError::NoUsableCredentials {
            details: "keychain: not found".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Credentials);

        let err = QuotapaneError::CredentialsMalformed {
            source_name: "~/.claude/.credentials.json".to_string(),
            reason: "invalid JSON".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Credentials);
    }

    #[test]
    fn auth_errors_have_correct_category() {
        let err = QuotapaneError::AuthRejected {
            message: "invalid bearer token".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);

        let err = QuotapaneError::RefreshRejected {
            message: "invalid_grant".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);

        let err = QuotapaneError::RefreshNetwork {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);
    }

    #[test]
    fn upstream_errors_have_correct_category() {
        let err = QuotapaneError::RateLimited {
            message: "too many requests".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::RateLimit);

        let err = QuotapaneError::Api {
            status: 500,
            message: "internal error".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Api);

        // Transport failures carry status 0 but stay in the Api category.
        let err = QuotapaneError::Api {
            status: 0,
            message: "connection reset".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Api);
    }

    #[test]
    fn pane_errors_have_correct_category() {
        let err = QuotapaneError::Tmux {
            message: "no server running".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Pane);

        let err = QuotapaneError::PaneMove {
            step: "join".to_string(),
            message: "pane vanished".to_string(),
            restored: true,
        };
        assert_eq!(err.category(), ErrorCategory::Pane);
    }

    #[test]
    fn retryable_errors() {
        assert!(
            QuotapaneError::RateLimited {
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            QuotapaneError::Api {
                status: 0,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            QuotapaneError::RefreshNetwork {
                message: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn non_retryable_errors() {
        assert!(
            !QuotapaneError::AuthRejected {
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !QuotapaneError::NoUsableCredentials {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !QuotapaneError::RefreshRejected {
                message: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn user_message_is_actionable_for_auth_errors() {
        let err = QuotapaneError::AuthRejected {
            message: "401 Unauthorized: {\"error\":...}".to_string(),
        };
        let msg = err.user_message();
        assert!(msg.contains("claude login"), "got: {msg}");
        assert!(!msg.contains("401"), "raw HTTP detail leaked: {msg}");
    }

    #[test]
    fn user_message_is_actionable_for_missing_credentials() {
        let err = QuotapaneError::NoUsableCredentials {
            details: "keychain: not found; claude-cli: not found".to_string(),
        };
        assert!(err.user_message().contains("claude login"));
    }

    #[test]
    fn user_message_truncates_long_server_text() {
        let err = QuotapaneError::Api {
            status: 503,
            message: "x".repeat(500),
        };
        let msg = err.user_message();
        assert!(msg.chars().count() <= MAX_DISPLAY_MESSAGE);
        assert!(msg.ends_with('\u{2026}'));
    }

    #[test]
    fn truncate_message_leaves_short_text_alone() {
        assert_eq!(truncate_message("short", 20), "short");
    }

    #[test]
    fn display_mentions_status_code() {
        let err = QuotapaneError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert!(err.to_string().contains("502"));
    }
}
