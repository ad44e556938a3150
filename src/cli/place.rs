//! The `open` and `move` commands: pane placement.

use crate::cli::args::{MoveArgs, OpenArgs};
use crate::error::{QuotapaneError, Result};
use crate::pane::{PANE_TITLE, PaneController, PanePosition, ShellTmux};

/// Create the monitor pane and start the monitor inside it.
///
/// # Errors
///
/// Returns a tmux error if the pane cannot be created.
pub fn execute_open(args: &OpenArgs) -> Result<()> {
    let position: PanePosition = args.position.parse()?;

    let exe = std::env::current_exe()
        .map_or_else(|_| "quotapane".to_string(), |p| p.display().to_string());
    let command = format!("{exe} run --interval {}", args.interval);

    let controller = PaneController::new(ShellTmux::new());
    let (pane_id, outcome) = controller.open(position, &command)?;
    println!(
        "monitor pane {pane_id} at {} ({} mode)",
        outcome.position,
        mode_name(outcome.compact)
    );
    Ok(())
}

/// Relocate the monitor pane.
///
/// # Errors
///
/// Returns a pane-move error describing the failed step and whether the
/// previous layout was restored.
pub fn execute_move(args: &MoveArgs) -> Result<()> {
    let to: PanePosition = args.to.parse()?;
    let tmux = ShellTmux::new();

    let pane_id = match &args.pane {
        Some(id) => id.clone(),
        None => tmux.find_pane_by_title(PANE_TITLE)?.ok_or_else(|| {
            QuotapaneError::Other(anyhow::anyhow!(
                "no monitor pane found; pass --pane or start one with `quotapane open`"
            ))
        })?,
    };

    let controller = PaneController::new(tmux);
    let outcome = controller.move_to(&pane_id, to)?;
    println!(
        "monitor pane {pane_id} now at {} ({} mode)",
        outcome.position,
        mode_name(outcome.compact)
    );
    Ok(())
}

const fn mode_name(compact: bool) -> &'static str {
    if compact { "compact" } else { "detailed" }
}
