//! Unit tests for the pane-move protocol against a fake tmux.
//!
//! The fake records every command and tracks where the single monitor pane
//! lives, so the tests can assert protocol order and the no-lost-pane
//! invariant without a real multiplexer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use quotapane::QuotapaneError;
use quotapane::error::Result;
use quotapane::pane::{MoveOutcome, PaneController, PanePosition, TmuxCommands};

const MONITOR: &str = "%1";
const USER_PANE: &str = "%0";

struct FakeState {
    ops: Vec<String>,
    pane_window: &'static str, // "main" or "hold"
    pane_position: PanePosition,
    fail_join_at: Vec<PanePosition>,
    active_queue: VecDeque<String>,
}

#[derive(Clone)]
struct FakeTmux {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTmux {
    fn new(start: PanePosition) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                ops: Vec::new(),
                pane_window: "main",
                pane_position: start,
                fail_join_at: Vec::new(),
                active_queue: VecDeque::new(),
            })),
        }
    }

    fn fail_joins_at(&self, positions: &[PanePosition]) {
        self.state.lock().unwrap().fail_join_at = positions.to_vec();
    }

    fn queue_active_panes(&self, panes: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.active_queue = panes.iter().map(|p| (*p).to_string()).collect();
    }

    fn ops(&self) -> Vec<String> {
        self.state.lock().unwrap().ops.clone()
    }

    fn pane_window(&self) -> &'static str {
        self.state.lock().unwrap().pane_window
    }

    fn pane_position(&self) -> PanePosition {
        self.state.lock().unwrap().pane_position
    }

    fn record(&self, op: impl Into<String>) {
        self.state.lock().unwrap().ops.push(op.into());
    }
}

impl TmuxCommands for FakeTmux {
    fn current_session(&self) -> Result<String> {
        Ok("main-session".to_string())
    }

    fn active_pane(&self) -> Result<String> {
        self.record("active");
        let mut state = self.state.lock().unwrap();
        Ok(state
            .active_queue
            .pop_front()
            .unwrap_or_else(|| USER_PANE.to_string()))
    }

    fn pane_position(&self, _pane_id: &str) -> Result<PanePosition> {
        Ok(self.state.lock().unwrap().pane_position)
    }

    fn split_window(&self, _target: &str, position: PanePosition, _command: &str) -> Result<String> {
        self.record(format!("split {position}"));
        let mut state = self.state.lock().unwrap();
        state.pane_window = "main";
        state.pane_position = position;
        Ok(MONITOR.to_string())
    }

    fn break_pane(&self, _pane_id: &str, _window_name: &str) -> Result<()> {
        self.record("break");
        self.state.lock().unwrap().pane_window = "hold";
        Ok(())
    }

    fn join_pane(&self, _pane_id: &str, target: &str, position: PanePosition) -> Result<()> {
        self.record(format!("join {position} -> {target}"));
        let mut state = self.state.lock().unwrap();
        if state.fail_join_at.contains(&position) {
            return Err(QuotapaneError::Tmux {
                message: format!("join at {position} rejected"),
            });
        }
        state.pane_window = "main";
        state.pane_position = position;
        Ok(())
    }

    fn select_pane(&self, pane_id: &str) -> Result<()> {
        self.record(format!("select {pane_id}"));
        Ok(())
    }

    fn set_pane_title(&self, _pane_id: &str, title: &str) -> Result<()> {
        self.record(format!("title {title}"));
        Ok(())
    }

    fn install_resize_hook(&self, _session: &str, _pane_id: &str, rows: u16) -> Result<()> {
        self.record(format!("hook {rows}"));
        Ok(())
    }

    fn remove_resize_hook(&self, _session: &str) -> Result<()> {
        self.record("unhook");
        Ok(())
    }
}

fn index_of(ops: &[String], prefix: &str) -> usize {
    ops.iter()
        .position(|op| op.starts_with(prefix))
        .unwrap_or_else(|| panic!("op `{prefix}` not found in {ops:?}"))
}

// =============================================================================
// Successful Moves
// =============================================================================

#[test]
fn move_bottom_to_top_follows_the_protocol_order() {
    let fake = FakeTmux::new(PanePosition::Bottom);
    let controller = PaneController::new(fake.clone());

    let outcome = controller.move_to(MONITOR, PanePosition::Top).expect("moved");
    assert_eq!(
        outcome,
        MoveOutcome {
            position: PanePosition::Top,
            compact: true
        }
    );

    let ops = fake.ops();
    let unhook = index_of(&ops, "unhook");
    let detach = index_of(&ops, "break");
    let join = index_of(&ops, "join top");
    let title = index_of(&ops, "title quotapane");
    let focus = index_of(&ops, &format!("select {USER_PANE}"));
    let hook = index_of(&ops, "hook 6");
    assert!(unhook < detach, "stale hook removed before the layout changes");
    assert!(detach < join, "detach precedes re-attach");
    assert!(join < title && join < focus, "title/focus re-applied after join");
    assert!(join < hook, "row pin installed after the pane is in place");

    assert_eq!(fake.pane_window(), "main");
    assert_eq!(fake.pane_position(), PanePosition::Top);
}

#[test]
fn move_to_left_reports_detailed_mode_and_skips_row_pinning() {
    let fake = FakeTmux::new(PanePosition::Top);
    let controller = PaneController::new(fake.clone());

    let outcome = controller.move_to(MONITOR, PanePosition::Left).expect("moved");
    assert!(!outcome.compact);

    let ops = fake.ops();
    assert!(ops.iter().any(|op| op.starts_with("join left")));
    // Left/right panes are width-pinned by the split itself; no layout hook.
    assert!(!ops.iter().any(|op| op.starts_with("hook ")), "ops: {ops:?}");
}

#[test]
fn move_to_current_position_is_a_no_op() {
    let fake = FakeTmux::new(PanePosition::Top);
    let controller = PaneController::new(fake.clone());

    let outcome = controller.move_to(MONITOR, PanePosition::Top).expect("no-op");
    assert_eq!(outcome.position, PanePosition::Top);
    assert!(!fake.ops().iter().any(|op| op == "break"));
}

#[test]
fn move_issued_from_inside_the_monitor_pane_retargets() {
    let fake = FakeTmux::new(PanePosition::Bottom);
    // Focus is on the monitor pane itself when the move is issued.
    fake.queue_active_panes(&[MONITOR, USER_PANE]);
    let controller = PaneController::new(fake.clone());

    controller.move_to(MONITOR, PanePosition::Right).expect("moved");

    let ops = fake.ops();
    // The join target must be a pane still in the main window, not the
    // detached monitor pane.
    assert!(
        ops.iter().any(|op| op == &format!("join right -> {USER_PANE}")),
        "ops: {ops:?}"
    );
}

// =============================================================================
// Failure Recovery
// =============================================================================

#[test]
fn failed_join_restores_the_original_position() {
    let fake = FakeTmux::new(PanePosition::Bottom);
    fake.fail_joins_at(&[PanePosition::Top]);
    let controller = PaneController::new(fake.clone());

    let err = controller
        .move_to(MONITOR, PanePosition::Top)
        .expect_err("join fails");
    match err {
        QuotapaneError::PaneMove { step, restored, .. } => {
            assert_eq!(step, "join");
            assert!(restored, "best-effort restore succeeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Exactly one monitor pane, at its pre-move position.
    assert_eq!(fake.pane_window(), "main");
    assert_eq!(fake.pane_position(), PanePosition::Bottom);

    let ops = fake.ops();
    let failed = index_of(&ops, "join top");
    let restore = index_of(&ops, "join bottom");
    assert!(failed < restore);
}

#[test]
fn restore_reinstalls_the_hook_for_a_compact_origin() {
    let fake = FakeTmux::new(PanePosition::Bottom);
    fake.fail_joins_at(&[PanePosition::Left]);
    let controller = PaneController::new(fake.clone());

    let err = controller
        .move_to(MONITOR, PanePosition::Left)
        .expect_err("join fails");
    assert!(matches!(
        err,
        QuotapaneError::PaneMove { restored: true, .. }
    ));

    // Back at bottom, the row pin applies again.
    let ops = fake.ops();
    assert!(ops.iter().any(|op| op == "hook 6"), "ops: {ops:?}");
    assert_eq!(fake.pane_position(), PanePosition::Bottom);
}

#[test]
fn failed_restore_is_surfaced_without_panicking() {
    let fake = FakeTmux::new(PanePosition::Bottom);
    fake.fail_joins_at(&[PanePosition::Top, PanePosition::Bottom]);
    let controller = PaneController::new(fake.clone());

    let err = controller
        .move_to(MONITOR, PanePosition::Top)
        .expect_err("join and restore fail");
    match err {
        QuotapaneError::PaneMove { restored, .. } => assert!(!restored),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fake.pane_window(), "hold");
}

// =============================================================================
// Open
// =============================================================================

#[test]
fn open_creates_titled_pane_with_hook_for_compact_position() {
    let fake = FakeTmux::new(PanePosition::Bottom);
    let controller = PaneController::new(fake.clone());

    let (pane_id, outcome) = controller
        .open(PanePosition::Bottom, "quotapane run")
        .expect("opened");
    assert_eq!(pane_id, MONITOR);
    assert!(outcome.compact);

    let ops = fake.ops();
    assert!(ops.iter().any(|op| op == "split bottom"));
    assert!(ops.iter().any(|op| op == "title quotapane"));
    assert!(ops.iter().any(|op| op == "hook 6"));
}

#[test]
fn open_at_right_skips_the_hook() {
    let fake = FakeTmux::new(PanePosition::Bottom);
    let controller = PaneController::new(fake.clone());

    let (_, outcome) = controller
        .open(PanePosition::Right, "quotapane run")
        .expect("opened");
    assert!(!outcome.compact);
    assert!(!fake.ops().iter().any(|op| op.starts_with("hook ")));
}
