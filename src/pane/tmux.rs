//! tmux command execution.
//!
//! The pane controller talks to tmux through the narrow [`TmuxCommands`]
//! trait so its move/recovery protocol can be unit-tested against a fake.
//! [`ShellTmux`] is the real implementation, shelling out to the `tmux`
//! binary one strictly sequential command at a time.

use std::process::Command;

use crate::error::{QuotapaneError, Result};

use super::PanePosition;

/// Window name panes are detached into mid-move.
pub const HOLD_WINDOW_NAME: &str = "quotapane-hold";

/// The tmux operations the pane controller needs.
///
/// Panes are always addressed by their stable `%id`, never by a positional
/// index; positional indices are meaningless once a layout is
/// mid-transition.
pub trait TmuxCommands {
    /// Name of the session the monitor lives in.
    fn current_session(&self) -> Result<String>;

    /// `%id` of the currently focused pane.
    fn active_pane(&self) -> Result<String>;

    /// Derive a pane's position from the live layout.
    fn pane_position(&self, pane_id: &str) -> Result<PanePosition>;

    /// Split a new pane off `target` at `position` running `command`.
    /// Returns the new pane's `%id`. Focus stays on `target`.
    fn split_window(&self, target: &str, position: PanePosition, command: &str) -> Result<String>;

    /// Detach a pane into a holding window named `window_name`.
    fn break_pane(&self, pane_id: &str, window_name: &str) -> Result<()>;

    /// Re-attach a detached pane next to `target` at `position`, with the
    /// fixed size for that position. Focus stays on `target`.
    fn join_pane(&self, pane_id: &str, target: &str, position: PanePosition) -> Result<()>;

    /// Focus a pane.
    fn select_pane(&self, pane_id: &str) -> Result<()>;

    /// Set a pane's human-readable title.
    fn set_pane_title(&self, pane_id: &str, title: &str) -> Result<()>;

    /// Install a layout-changed hook re-pinning `pane_id` to `rows` rows.
    /// tmux rebalances cell sizes on many layout-affecting events; without
    /// the hook the monitor pane would grow back.
    fn install_resize_hook(&self, session: &str, pane_id: &str, rows: u16) -> Result<()>;

    /// Remove the layout-changed hook for a session.
    fn remove_resize_hook(&self, session: &str) -> Result<()>;
}

/// Validate a stable pane identity (`%` followed by digits) before it is
/// interpolated into a command line.
fn validate_pane_id(pane_id: &str) -> Result<()> {
    let digits = pane_id.strip_prefix('%').unwrap_or("");
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QuotapaneError::Tmux {
            message: format!("invalid pane id: {pane_id}"),
        });
    }
    Ok(())
}

/// Real tmux, via the `tmux` binary.
pub struct ShellTmux;

impl ShellTmux {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Whether a tmux server is reachable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        Command::new("tmux")
            .arg("list-sessions")
            .output()
            .map(|o| o.status.success())
            .is_ok_and(|ok| ok)
    }

    /// Find a pane by its title across the current session's windows.
    ///
    /// # Errors
    ///
    /// Returns error if tmux cannot be executed.
    pub fn find_pane_by_title(&self, title: &str) -> Result<Option<String>> {
        let output = self.run(&["list-panes", "-s", "-F", "#{pane_id}\t#{pane_title}"])?;
        Ok(output.lines().find_map(|line| {
            let (pane_id, pane_title) = line.split_once('\t')?;
            (pane_title == title).then(|| pane_id.to_string())
        }))
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("tmux")
            .args(args)
            .output()
            .map_err(|e| QuotapaneError::Tmux {
                message: format!("failed to execute tmux: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(QuotapaneError::Tmux {
                message: format!("tmux {} failed: {}", args.first().unwrap_or(&""), stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for ShellTmux {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxCommands for ShellTmux {
    fn current_session(&self) -> Result<String> {
        self.run(&["display-message", "-p", "#{session_name}"])
    }

    fn active_pane(&self) -> Result<String> {
        self.run(&["display-message", "-p", "#{pane_id}"])
    }

    fn pane_position(&self, pane_id: &str) -> Result<PanePosition> {
        validate_pane_id(pane_id)?;
        let flags = self.run(&[
            "display-message",
            "-p",
            "-t",
            pane_id,
            "#{pane_at_top},#{pane_at_bottom},#{pane_at_left},#{pane_at_right}",
        ])?;
        derive_position(&flags)
    }

    fn split_window(&self, target: &str, position: PanePosition, command: &str) -> Result<String> {
        let size = position.split_size();
        let mut args = vec!["split-window", "-d", "-f"];
        if position.joins_before() {
            args.push("-b");
        }
        args.push(if position.is_vertical_split() { "-v" } else { "-h" });
        args.extend(["-l", size.as_str(), "-t", target, "-P", "-F", "#{pane_id}", command]);
        self.run(&args)
    }

    fn break_pane(&self, pane_id: &str, window_name: &str) -> Result<()> {
        validate_pane_id(pane_id)?;
        self.run(&["break-pane", "-d", "-s", pane_id, "-n", window_name])?;
        Ok(())
    }

    fn join_pane(&self, pane_id: &str, target: &str, position: PanePosition) -> Result<()> {
        validate_pane_id(pane_id)?;
        let size = position.split_size();
        let mut args = vec!["join-pane", "-d", "-f"];
        if position.joins_before() {
            args.push("-b");
        }
        args.push(if position.is_vertical_split() { "-v" } else { "-h" });
        args.extend(["-l", size.as_str(), "-s", pane_id, "-t", target]);
        self.run(&args)?;
        Ok(())
    }

    fn select_pane(&self, pane_id: &str) -> Result<()> {
        validate_pane_id(pane_id)?;
        self.run(&["select-pane", "-t", pane_id])?;
        Ok(())
    }

    fn set_pane_title(&self, pane_id: &str, title: &str) -> Result<()> {
        validate_pane_id(pane_id)?;
        self.run(&["select-pane", "-t", pane_id, "-T", title])?;
        Ok(())
    }

    fn install_resize_hook(&self, session: &str, pane_id: &str, rows: u16) -> Result<()> {
        validate_pane_id(pane_id)?;
        let command = format!("resize-pane -t {pane_id} -y {rows}");
        self.run(&[
            "set-hook",
            "-t",
            session,
            "window-layout-changed",
            command.as_str(),
        ])?;
        Ok(())
    }

    fn remove_resize_hook(&self, session: &str) -> Result<()> {
        self.run(&["set-hook", "-u", "-t", session, "window-layout-changed"])?;
        Ok(())
    }
}

/// Map tmux edge flags (`at_top,at_bottom,at_left,at_right`) back to a
/// placement position. A pane spanning the full width is Top or Bottom; one
/// spanning the full height is Left or Right.
fn derive_position(flags: &str) -> Result<PanePosition> {
    let mut parts = flags.split(',').map(|p| p.trim() == "1");
    let (Some(top), Some(bottom), Some(left), Some(right)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(QuotapaneError::Tmux {
            message: format!("unexpected layout flags: {flags}"),
        });
    };

    if left && right {
        return Ok(if top { PanePosition::Top } else { PanePosition::Bottom });
    }
    if top && bottom {
        return Ok(if left { PanePosition::Left } else { PanePosition::Right });
    }

    Err(QuotapaneError::Tmux {
        message: format!("pane is not at a window edge (flags {flags})"),
    })
}
