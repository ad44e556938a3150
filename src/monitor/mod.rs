//! Monitor engine: polling cadence and last-known state.
//!
//! The engine cycles Idle → Fetching → (Updated | Failed) → Idle, driven by
//! a tokio interval plus on-demand single-shot fetches. It recovers from
//! every API client failure locally: a failed cycle stores the error and
//! keeps the previous good data on display, and never terminates the
//! polling loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use crate::api::UsageClient;
use crate::core::models::{Profile, UsageSnapshot};

// =============================================================================
// Monitor State
// =============================================================================

/// Renderable state, written only by the engine's fetch cycle.
///
/// Invariant: `last_error` and a successful `usage`/`profile` update are
/// mutually exclusive within one fetch cycle.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    pub usage: Option<UsageSnapshot>,
    pub profile: Option<Profile>,
    pub last_fetch: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub is_running: bool,
}

// =============================================================================
// Stop Handle
// =============================================================================

struct StopState {
    stopped: AtomicBool,
    notify: Notify,
}

/// Cloneable handle that stops a running engine.
///
/// Effective immediately: the engine does not wait for an in-flight fetch;
/// it discards that fetch's eventual result and emits no further
/// notifications.
#[derive(Clone)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

impl StopHandle {
    /// Stop the engine.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a stop issued between two polls of
        // the run loop is not lost.
        self.inner.notify.notify_one();
    }

    /// Whether stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Monitor Engine
// =============================================================================

type Subscriber = Box<dyn FnMut(&MonitorState) + Send>;

/// Owns the polling loop, the last-known state, and change notifications.
pub struct MonitorEngine {
    client: UsageClient,
    state: MonitorState,
    subscribers: Vec<Subscriber>,
    stop: Arc<StopState>,
}

impl MonitorEngine {
    #[must_use]
    pub fn new(client: UsageClient) -> Self {
        Self {
            client,
            state: MonitorState::default(),
            subscribers: Vec::new(),
            stop: Arc::new(StopState {
                stopped: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Register a callback invoked synchronously on every update or error
    /// transition. Callbacks run in registration order; at most one
    /// notification is in flight at a time.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&MonitorState) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Handle for stopping the engine from another task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            inner: Arc::clone(&self.stop),
        }
    }

    /// Single fetch cycle.
    ///
    /// On success, replaces `usage`/`profile`/`last_fetch` and clears
    /// `last_error`; on failure, sets `last_error` and leaves the previous
    /// data displayed. Emits exactly one notification either way, unless
    /// the engine was stopped while the fetch was in flight, in which case
    /// the result is discarded and nothing is notified.
    pub async fn fetch(&mut self) {
        tracing::debug!("fetch cycle starting");
        let result = self.client.get_summary().await;

        if self.stop.stopped.load(Ordering::SeqCst) {
            tracing::debug!("engine stopped mid-fetch; discarding result");
            return;
        }

        match result {
            Ok(summary) => {
                self.state.usage = Some(summary.usage);
                self.state.profile = Some(summary.profile);
                self.state.last_fetch = Some(Utc::now());
                self.state.last_error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "fetch cycle failed");
                // Stale-but-present data beats a blanked display: only the
                // error message changes.
                self.state.last_error = Some(e.user_message());
            }
        }

        self.notify();
    }

    /// Run the polling loop: an immediate fetch, then one per interval.
    ///
    /// A tick that fires while a fetch is still in flight is skipped rather
    /// than queued, bounding resource use under a slow upstream.
    pub async fn run(&mut self, interval: Duration) {
        self.state.is_running = true;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let stop = Arc::clone(&self.stop);

        loop {
            if stop.stopped.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                biased;
                () = stop.notify.notified() => break,
                _ = ticker.tick() => {
                    self.fetch().await;
                }
            }
        }

        self.state.is_running = false;
        tracing::debug!("polling loop stopped");
    }

    fn notify(&mut self) {
        let state = &self.state;
        for subscriber in &mut self.subscribers {
            subscriber(state);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;

    /// Client whose store resolves nothing, so every fetch fails fast
    /// without touching the network.
    fn failing_client() -> UsageClient {
        let store = CredentialStore::with_override("/nonexistent/quotapane-creds.json");
        UsageClient::new(store).expect("client")
    }

    #[tokio::test]
    async fn failed_fetch_sets_error_and_notifies_once() {
        let mut engine = MonitorEngine::new(failing_client());
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        engine.subscribe(move |state| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert!(state.last_error.is_some());
        });

        engine.fetch().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(engine.state().last_error.is_some());
        assert!(engine.state().usage.is_none());
        assert!(engine.state().last_fetch.is_none());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_data() {
        let mut engine = MonitorEngine::new(failing_client());
        engine.state.usage = Some(UsageSnapshot::default());
        engine.state.profile = Some(Profile::default());

        engine.fetch().await;

        assert!(engine.state().last_error.is_some());
        assert!(engine.state().usage.is_some(), "stale usage must survive");
        assert!(engine.state().profile.is_some(), "stale profile must survive");
    }

    #[tokio::test]
    async fn fetch_after_stop_is_discarded() {
        let mut engine = MonitorEngine::new(failing_client());
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        engine.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        engine.stop_handle().stop();
        engine.fetch().await;

        assert_eq!(count.load(Ordering::SeqCst), 0, "no notification after stop");
        assert!(engine.state().last_error.is_none(), "result discarded");
    }

    #[tokio::test]
    async fn run_exits_promptly_on_stop() {
        let mut engine = MonitorEngine::new(failing_client());
        let handle = engine.stop_handle();

        let runner = async {
            engine.run(Duration::from_secs(3600)).await;
            engine
        };
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        };

        let (engine, ()) = tokio::join!(runner, stopper);
        assert!(!engine.state().is_running);
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut engine = MonitorEngine::new(failing_client());
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            engine.subscribe(move |_| order.lock().unwrap().push(tag));
        }

        engine.notify();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }
}
