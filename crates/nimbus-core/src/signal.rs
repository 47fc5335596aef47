//! Version signal: the engine's only internal synchronization.
//!
//! A monotonic counter paired with a wait/notify primitive. Store
//! callbacks bump the counter; the dispatch worker sleeps on it between
//! iterations. The bounded sleep makes a missed wakeup self-correcting
//! and doubles as a heartbeat.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Default upper bound on the idle sleep.
pub const DEFAULT_WAIT_MAX: Duration = Duration::from_secs(5);

/// Monotonic change counter with a bounded wait.
#[derive(Debug)]
pub struct VersionSignal {
    /// Current version; only ever incremented.
    version: AtomicU64,
    /// Wakes all parked waiters on every bump.
    notify: Notify,
    /// Upper bound on a single `wait_for_update` sleep.
    wait_max: Duration,
}

impl VersionSignal {
    /// Create a signal with the default 5 s wait bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_wait_max(DEFAULT_WAIT_MAX)
    }

    /// Create a signal with a custom wait bound.
    #[must_use]
    pub fn with_wait_max(wait_max: Duration) -> Self {
        Self {
            version: AtomicU64::new(0),
            notify: Notify::new(),
            wait_max,
        }
    }

    /// Read the current version.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Increment the version and wake every parked waiter.
    pub fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    /// Park until the version moves past `seen`, for at most the wait
    /// bound.
    ///
    /// Returns immediately when `had_pending_work` is set (the caller
    /// deferred work and must re-run now) or when the version already
    /// advanced. The `Notified` future is registered before the version
    /// re-check, so a concurrent [`bump`](Self::bump) cannot be missed.
    pub async fn wait_for_update(&self, seen: u64, had_pending_work: bool) {
        if had_pending_work {
            return;
        }

        let notified = self.notify.notified();
        tokio::pin!(notified);
        let _ = notified.as_mut().enable();

        if self.current() != seen {
            return;
        }

        let _ = tokio::time::timeout(self.wait_max, notified).await;
    }
}

impl Default for VersionSignal {
    fn default() -> Self {
        Self::new()
    }
}
