//! Core data models.
//!
//! These mirror the wire shapes of the OAuth usage and profile endpoints
//! (snake_case field names are the API's own), and double as the renderable
//! state handed to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Usage Windows
// =============================================================================

/// A single rate-limited usage window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageWindow {
    /// Percentage of the window consumed (0-100).
    pub utilization: f64,

    /// When the window resets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    /// Percentage remaining in this window.
    #[must_use]
    pub fn remaining_percent(&self) -> f64 {
        (100.0 - self.utilization).max(0.0)
    }
}

/// Usage snapshot across all rate-limit windows.
///
/// Each window is independently nullable; the API omits windows that do not
/// apply to the account's tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Rolling 5-hour window.
    #[serde(default)]
    pub five_hour: Option<UsageWindow>,

    /// Rolling 7-day window.
    #[serde(default)]
    pub seven_day: Option<UsageWindow>,

    /// Rolling 7-day window for OAuth apps.
    #[serde(default)]
    pub seven_day_oauth_apps: Option<UsageWindow>,

    /// Rolling 7-day window for the Opus model family.
    #[serde(default)]
    pub seven_day_opus: Option<UsageWindow>,
}

impl UsageSnapshot {
    /// True when the account reports no windows at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.five_hour.is_none()
            && self.seven_day.is_none()
            && self.seven_day_oauth_apps.is_none()
            && self.seven_day_opus.is_none()
    }

    /// Iterate present windows with display labels.
    pub fn windows(&self) -> impl Iterator<Item = (&'static str, &UsageWindow)> {
        [
            ("5h", self.five_hour.as_ref()),
            ("7d", self.seven_day.as_ref()),
            ("7d apps", self.seven_day_oauth_apps.as_ref()),
            ("7d opus", self.seven_day_opus.as_ref()),
        ]
        .into_iter()
        .filter_map(|(label, window)| window.map(|w| (label, w)))
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Account identity from the profile endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileAccount {
    #[serde(default, alias = "email_address")]
    pub email: Option<String>,

    #[serde(default, alias = "full_name")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub has_claude_pro: bool,

    #[serde(default)]
    pub has_claude_max: bool,
}

/// Organization attached to the account, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileOrganization {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub organization_type: Option<String>,

    #[serde(default)]
    pub billing_type: Option<String>,
}

/// Account identity and optional organization. Replaced wholesale on each
/// successful profile fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub account: ProfileAccount,

    #[serde(default)]
    pub organization: Option<ProfileOrganization>,
}

impl Profile {
    /// Short plan label for the display pane.
    #[must_use]
    pub const fn plan_label(&self) -> &'static str {
        if self.account.has_claude_max {
            "Max"
        } else if self.account.has_claude_pro {
            "Pro"
        } else {
            "Free"
        }
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Combined result of the parallel usage + profile fetch.
#[derive(Debug, Clone)]
pub struct Summary {
    pub usage: UsageSnapshot,
    pub profile: Profile,
}

// =============================================================================
// Tests
// =============================================================================
