//! The expiration task.
//!
//! Periodic housekeeping: removes messages past their absolute expiry
//! time. The task itself never blocks; a scheduler loop polls
//! [`ExpirationTask::next_interval`] between firings, so the period can
//! be adjusted at runtime and cancellation simply drops the task.

use crate::metrics;
use nimbus_core::{MessageStore, RemovalReason};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Scheduling state of the task.
#[derive(Debug, Clone, Copy)]
enum ExpiryState {
    /// Task fires every `interval`.
    Active { interval: Duration },
    /// Task is done; the scheduler drops it.
    Cancelled,
}

/// Recurring job that garbage-collects expired messages.
pub(crate) struct ExpirationTask {
    store: Arc<dyn MessageStore>,
    state: Mutex<ExpiryState>,
}

impl ExpirationTask {
    pub(crate) fn new(store: Arc<dyn MessageStore>, interval: Duration) -> Self {
        Self {
            store,
            state: Mutex::new(ExpiryState::Active { interval }),
        }
    }

    /// One firing. No-op once cancelled; all store errors are swallowed
    /// because the next tick retries the same work.
    pub(crate) fn run_once(&self) {
        if self.next_interval().is_none() {
            return;
        }

        let expired = match self.store.expired_messages() {
            Ok(expired) => expired,
            Err(e) => {
                error!(error = %e, "Failed to query expired messages");
                return;
            }
        };
        if expired.is_empty() {
            return;
        }

        match self.store.remove_messages(&expired, RemovalReason::Expired) {
            Ok(()) => {
                metrics::record_expired(expired.len());
                debug!(count = expired.len(), "Removed expired messages");
            }
            Err(e) => {
                error!(error = %e, "Failed to remove expired messages");
            }
        }
    }

    /// The period until the next firing; `None` once cancelled.
    pub(crate) fn next_interval(&self) -> Option<Duration> {
        match *self.state.lock().unwrap() {
            ExpiryState::Active { interval } => Some(interval),
            ExpiryState::Cancelled => None,
        }
    }

    /// Change the period. Ignored once cancelled.
    pub(crate) fn set_interval(&self, interval: Duration) {
        let mut state = self.state.lock().unwrap();
        if let ExpiryState::Active { .. } = *state {
            *state = ExpiryState::Active { interval };
        }
    }

    /// Stop the task; the scheduler drops it at the next poll.
    pub(crate) fn cancel(&self) {
        *self.state.lock().unwrap() = ExpiryState::Cancelled;
    }

    /// Scheduler loop: sleep the current period, fire, repeat.
    pub(crate) async fn run_scheduler(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Expiration task registered");

        while let Some(interval) = self.next_interval() {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => self.run_once(),
            }
        }

        info!("Expiration task dropped");
    }
}
