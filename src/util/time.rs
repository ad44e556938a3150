//! Time formatting utilities.

use chrono::{DateTime, Utc};

/// Format the time remaining until a window reset.
///
/// Renders hours and minutes ("3h 12m"), minutes alone under an hour
/// ("45m"), and days above 24 hours ("2d 5h"). A reset in the past renders
/// "now", never a negative duration.
#[must_use]
pub fn format_reset_in(resets_at: DateTime<Utc>) -> String {
    format_reset_in_at(resets_at, Utc::now())
}

/// Same as [`format_reset_in`] with an explicit "now" for deterministic tests.
#[must_use]
pub fn format_reset_in_at(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = resets_at.signed_duration_since(now);

    if duration.num_seconds() <= 0 {
        return "now".to_string();
    }

    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;

    if hours >= 24 {
        let days = hours / 24;
        format!("{days}d {}h", hours % 24)
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        "<1m".to_string()
    }
}

/// Format a utilization percentage for the display pane.
#[must_use]
pub fn format_utilization(utilization: f64) -> String {
    format!("{:.0}%", utilization.clamp(0.0, 100.0))
}
