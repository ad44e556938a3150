//! The `status` command: one-shot summary fetch.

use serde_json::json;

use crate::api::UsageClient;
use crate::cli::args::StatusArgs;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::util::time::{format_reset_in, format_utilization};

/// Fetch a single summary and print it to stdout.
///
/// # Errors
///
/// Propagates any credentials, authentication, or API error from the fetch.
pub async fn execute(args: &StatusArgs, store: CredentialStore) -> Result<()> {
    let client = UsageClient::new(store)?;
    let summary = client.get_summary().await?;

    if args.json {
        let payload = json!({
            "usage": summary.usage,
            "profile": summary.profile,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let account = &summary.profile.account;
    let who = account
        .email
        .as_deref()
        .or(account.display_name.as_deref())
        .unwrap_or("Claude");
    println!("{who} ({})", summary.profile.plan_label());
    if let Some(org) = summary
        .profile
        .organization
        .as_ref()
        .and_then(|o| o.name.as_deref())
    {
        println!("organization: {org}");
    }

    if summary.usage.is_empty() {
        println!("no usage windows reported for this account");
        return Ok(());
    }

    for (label, window) in summary.usage.windows() {
        let reset = window
            .resets_at
            .map_or_else(|| "-".to_string(), format_reset_in);
        println!(
            "{label:<8} {:>4} used  resets {reset}",
            format_utilization(window.utilization)
        );
    }

    Ok(())
}
