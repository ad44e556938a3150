//! Pane placement: creating and relocating the monitor pane.
//!
//! The monitor pane can sit at the top, bottom, left, or right of the main
//! window. Top/bottom are vertical splits pinned to a few rows and imply
//! the compact rendering; left/right are horizontal splits pinned to a
//! percentage of columns and imply the detailed rendering. Layout state is
//! never duplicated locally: the current position is re-derived from tmux
//! before each move.

pub mod tmux;

use std::str::FromStr;

use crate::error::{QuotapaneError, Result};

pub use tmux::{HOLD_WINDOW_NAME, ShellTmux, TmuxCommands};

/// Rows the monitor pane is pinned to in top/bottom positions.
pub const MONITOR_ROWS: u16 = 6;

/// Column percentage the monitor pane is pinned to in left/right positions.
pub const MONITOR_WIDTH_PERCENT: u16 = 30;

/// Title re-applied to the monitor pane after every move.
pub const PANE_TITLE: &str = "quotapane";

// =============================================================================
// Pane Position
// =============================================================================

/// The four placement positions, as (orientation, index) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanePosition {
    Top,
    Bottom,
    Left,
    Right,
}

impl PanePosition {
    /// Top/bottom positions use the compact rendering.
    #[must_use]
    pub const fn is_compact(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }

    /// Top/bottom are vertical splits; left/right horizontal.
    #[must_use]
    pub const fn is_vertical_split(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }

    /// Top/left panes are attached before the target pane.
    #[must_use]
    pub const fn joins_before(self) -> bool {
        matches!(self, Self::Top | Self::Left)
    }

    /// Fixed split size argument for this position.
    #[must_use]
    pub fn split_size(self) -> String {
        if self.is_vertical_split() {
            MONITOR_ROWS.to_string()
        } else {
            format!("{MONITOR_WIDTH_PERCENT}%")
        }
    }
}

impl FromStr for PanePosition {
    type Err = QuotapaneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(QuotapaneError::Other(anyhow::anyhow!(
                "unknown pane position: {other} (expected top, bottom, left, or right)"
            ))),
        }
    }
}

impl std::fmt::Display for PanePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        };
        write!(f, "{name}")
    }
}

/// Result of a successful placement, so the caller can switch rendering
/// without separately tracking position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub position: PanePosition,
    pub compact: bool,
}

impl MoveOutcome {
    const fn at(position: PanePosition) -> Self {
        Self {
            position,
            compact: position.is_compact(),
        }
    }
}

// =============================================================================
// Pane Controller
// =============================================================================

/// Creates and relocates the monitor pane.
pub struct PaneController<T: TmuxCommands> {
    tmux: T,
}

impl<T: TmuxCommands> PaneController<T> {
    pub const fn new(tmux: T) -> Self {
        Self { tmux }
    }

    /// Create the monitor pane at `position`, running `command` inside it.
    /// Returns the new pane's stable `%id`.
    ///
    /// # Errors
    ///
    /// Returns a tmux error if the split fails; nothing is created then.
    pub fn open(&self, position: PanePosition, command: &str) -> Result<(String, MoveOutcome)> {
        let session = self.tmux.current_session()?;
        let target = self.tmux.active_pane()?;

        let pane_id = self.tmux.split_window(&target, position, command)?;
        self.tmux.set_pane_title(&pane_id, PANE_TITLE)?;
        if position.is_compact() {
            self.tmux.install_resize_hook(&session, &pane_id, MONITOR_ROWS)?;
        }

        tracing::info!(%pane_id, %position, "monitor pane created");
        Ok((pane_id, MoveOutcome::at(position)))
    }

    /// Relocate the monitor pane to `to`.
    ///
    /// The move is a protocol, not a single command: remove the stale
    /// auto-resize hook, detach the pane into a holding window, re-attach
    /// at the new position, re-apply title and focus, and re-install the
    /// hook for compact positions. If the re-attachment fails, the pane is
    /// re-attached at its original position on a best-effort basis so a
    /// failed move degrades to "unchanged" rather than "pane lost".
    ///
    /// # Errors
    ///
    /// [`QuotapaneError::PaneMove`] describing the failed step and whether
    /// the original layout was restored.
    pub fn move_to(&self, pane_id: &str, to: PanePosition) -> Result<MoveOutcome> {
        let session = self.tmux.current_session()?;
        let from = self.tmux.pane_position(pane_id)?;
        if from == to {
            return Ok(MoveOutcome::at(to));
        }

        // A hook left over from the current position would resize the wrong
        // pane once the layout changes underneath it.
        if let Err(e) = self.tmux.remove_resize_hook(&session) {
            tracing::debug!(error = %e, "no resize hook to remove");
        }

        // Nothing has moved yet; a failure here leaves the layout intact.
        let mut target = self.tmux.active_pane().map_err(|e| QuotapaneError::PaneMove {
            step: "prepare".to_string(),
            message: e.to_string(),
            restored: true,
        })?;

        self.tmux
            .break_pane(pane_id, HOLD_WINDOW_NAME)
            .map_err(|e| QuotapaneError::PaneMove {
                step: "detach".to_string(),
                message: e.to_string(),
                restored: true,
            })?;

        // The move may have been issued from inside the monitor pane; the
        // join target must be a pane still in the main window.
        if target == pane_id {
            target = match self.tmux.active_pane() {
                Ok(t) => t,
                Err(e) => {
                    return Err(QuotapaneError::PaneMove {
                        step: "target".to_string(),
                        message: e.to_string(),
                        restored: false,
                    });
                }
            };
        }

        if let Err(join_err) = self.tmux.join_pane(pane_id, &target, to) {
            let restored = self.restore(pane_id, &target, &session, from);
            return Err(QuotapaneError::PaneMove {
                step: "join".to_string(),
                message: join_err.to_string(),
                restored,
            });
        }

        self.finish(&session, pane_id, &target, to);
        tracing::info!(%pane_id, from = %from, to = %to, "monitor pane moved");
        Ok(MoveOutcome::at(to))
    }

    /// Best-effort re-attachment at the original position.
    fn restore(&self, pane_id: &str, target: &str, session: &str, from: PanePosition) -> bool {
        match self.tmux.join_pane(pane_id, target, from) {
            Ok(()) => {
                self.finish(session, pane_id, target, from);
                tracing::warn!(%pane_id, position = %from, "move failed; pane restored");
                true
            }
            Err(e) => {
                tracing::error!(%pane_id, error = %e, "move failed and pane could not be restored");
                false
            }
        }
    }

    /// Re-attachment preserves neither title nor focus; both are re-applied
    /// here, plus the row-pinning hook for compact positions. Failures are
    /// cosmetic and only logged.
    fn finish(&self, session: &str, pane_id: &str, target: &str, position: PanePosition) {
        if let Err(e) = self.tmux.set_pane_title(pane_id, PANE_TITLE) {
            tracing::warn!(error = %e, "failed to re-apply pane title");
        }
        if let Err(e) = self.tmux.select_pane(target) {
            tracing::warn!(error = %e, "failed to restore focus");
        }
        if position.is_compact() {
            if let Err(e) = self.tmux.install_resize_hook(session, pane_id, MONITOR_ROWS) {
                tracing::warn!(error = %e, "failed to install resize hook");
            }
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
    fn position_parsing() {
        assert_eq!("top".parse::<PanePosition>().unwrap(), PanePosition::Top);
        assert_eq!("BOTTOM".parse::<PanePosition>().unwrap(), PanePosition::Bottom);
        assert_eq!("Left".parse::<PanePosition>().unwrap(), PanePosition::Left);
        assert_eq!("right".parse::<PanePosition>().unwrap(), PanePosition::Right);
        assert!("middle".parse::<PanePosition>().is_err());
    }

    #[test]
    fn compactness_follows_orientation() {
        assert!(PanePosition::Top.is_compact());
        assert!(PanePosition::Bottom.is_compact());
        assert!(!PanePosition::Left.is_compact());
        assert!(!PanePosition::Right.is_compact());
    }

    #[test]
    fn split_sizes() {
        assert_eq!(PanePosition::Top.split_size(), "6");
        assert_eq!(PanePosition::Right.split_size(), "30%");
    }

    #[test]
    fn join_direction() {
        assert!(PanePosition::Top.joins_before());
        assert!(PanePosition::Left.joins_before());
        assert!(!PanePosition::Bottom.joins_before());
        assert!(!PanePosition::Right.joins_before());
    }

    #[test]
    fn outcome_reports_render_mode() {
        assert!(MoveOutcome::at(PanePosition::Top).compact);
        assert!(!MoveOutcome::at(PanePosition::Right).compact);
    }
}
