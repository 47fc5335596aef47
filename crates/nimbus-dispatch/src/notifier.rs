//! The notification worker.
//!
//! Wakes clients that have deliveries waiting so they poll for them.
//! Runs on a fixed cadence, deliberately decoupled from the dispatch
//! version signal: bursty publishes still produce roughly one poll hint
//! per client per interval.

use nimbus_core::{ClientEventSink, ClientEventType, MessageStore, PUBSUB_POLL_EVENT_CODE};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// The notification worker.
pub(crate) struct NotificationWorker {
    store: Arc<dyn MessageStore>,
    sink: Arc<dyn ClientEventSink>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl NotificationWorker {
    pub(crate) fn new(
        store: Arc<dyn MessageStore>,
        sink: Arc<dyn ClientEventSink>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            sink,
            interval,
            shutdown,
        }
    }

    /// Run until cancelled.
    pub(crate) async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Notification worker started");

        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,
                _ = tick.tick() => self.notify_pending_clients(),
            }
        }

        info!("Notification worker stopped");
    }

    /// One tick: hint every client with pending deliveries to poll.
    fn notify_pending_clients(&self) {
        let clients = match self.store.notifiable_clients() {
            Ok(clients) => clients,
            Err(e) => {
                error!(error = %e, "Failed to query notifiable clients");
                return;
            }
        };
        if clients.is_empty() {
            return;
        }

        debug!(count = clients.len(), "Sending poll hints");
        for client in &clients {
            self.sink
                .notify_client(client, PUBSUB_POLL_EVENT_CODE, ClientEventType::PubSub);
        }
        crate::metrics::record_clients_notified(clients.len());
    }
}
