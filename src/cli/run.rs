//! The `run` command: the monitor loop in the current pane.

use std::io::Write;
use std::time::Duration;

use crate::api::UsageClient;
use crate::cli::args::RunArgs;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::monitor::{MonitorEngine, MonitorState};
use crate::util::time::{format_reset_in, format_utilization};

/// Run the polling loop until Ctrl+C.
///
/// # Errors
///
/// Returns an error only on startup (HTTP client construction); fetch
/// failures are absorbed into the engine state and displayed.
pub async fn execute(args: &RunArgs, store: CredentialStore) -> Result<()> {
    let client = UsageClient::new(store)?;
    let mut engine = MonitorEngine::new(client);
    engine.subscribe(draw);

    let handle = engine.stop_handle();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        handle.stop();
    });

    engine.run(Duration::from_secs(args.interval.max(1))).await;
    Ok(())
}

/// Redraw the pane from the latest state.
fn draw(state: &MonitorState) {
    let mut out = std::io::stdout().lock();
    // Clear and home; the pane is ours.
    let _ = write!(out, "\x1b[2J\x1b[H");
    for line in render_lines(state) {
        let _ = writeln!(out, "{line}");
    }
    let _ = out.flush();
}

/// Plain-text rendering of the monitor state, one line per item. This is
/// the minimal built-in display; richer box-drawing renderers subscribe to
/// the same state.
fn render_lines(state: &MonitorState) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(profile) = &state.profile {
        let who = profile
            .account
            .email
            .as_deref()
            .or(profile.account.display_name.as_deref())
            .unwrap_or("Claude");
        match profile.organization.as_ref().and_then(|o| o.name.as_deref()) {
            Some(org) => lines.push(format!("{who} ({}) · {org}", profile.plan_label())),
            None => lines.push(format!("{who} ({})", profile.plan_label())),
        }
    }

    match &state.usage {
        Some(usage) if !usage.is_empty() => {
            for (label, window) in usage.windows() {
                let reset = window
                    .resets_at
                    .map_or_else(|| "-".to_string(), format_reset_in);
                lines.push(format!(
                    "{label:<8} {:>4}  resets {reset}",
                    format_utilization(window.utilization)
                ));
            }
        }
        Some(_) => lines.push("no usage windows reported for this account".to_string()),
        None => {}
    }

    if let Some(error) = &state.last_error {
        lines.push(format!("! {error}"));
    }
    if let Some(at) = state.last_fetch {
        lines.push(format!("updated {}", at.format("%H:%M:%S")));
    }
    if lines.is_empty() {
        lines.push("waiting for first fetch\u{2026}".to_string());
    }

    lines
}
