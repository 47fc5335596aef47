//! Engine lifecycle and entry points.
//!
//! The manager wires the workers to the store, owns the shared version
//! signal and cancellation token, and exposes the on-demand operations
//! (eviction, expiration-interval updates).

use crate::config::DispatchConfig;
use crate::expiry::ExpirationTask;
use crate::metrics;
use crate::notifier::NotificationWorker;
use crate::worker::DispatchWorker;
use nimbus_core::{
    ClientEventSink, MessageStore, RemovalReason, TopicListener, VersionSignal,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Listener handle registered with the store.
///
/// Owns only the version signal, so the store holding it does not keep
/// the engine (or the store itself, transitively) alive. Every topic
/// event is bounded work: a counter bump plus a wake.
struct TopicEventBridge {
    signal: Arc<VersionSignal>,
}

impl TopicListener for TopicEventBridge {
    fn on_subscription_created(&self, topic: &str) {
        trace!(topic = %topic, "Subscription created");
        self.signal.bump();
    }

    fn on_subscription_removed(&self, topic: &str) {
        trace!(topic = %topic, "Subscription removed");
        self.signal.bump();
    }

    fn on_message_arrived(&self, topic: &str) {
        trace!(topic = %topic, "Message arrived");
        self.signal.bump();
    }

    fn on_message_delivered(&self, topic: &str) {
        trace!(topic = %topic, "Message delivered");
        self.signal.bump();
    }
}

struct Inner {
    store: Arc<dyn MessageStore>,
    sink: Arc<dyn ClientEventSink>,
    config: DispatchConfig,
    signal: Arc<VersionSignal>,
    shutdown: CancellationToken,
    expiry: Arc<ExpirationTask>,
    started: AtomicBool,
}

/// The dispatch engine façade.
///
/// Cheap to clone; all clones share one engine. The workers are spawned
/// by [`start`](Self::start) and stopped cooperatively by
/// [`stop`](Self::stop): they finish their current iteration and exit,
/// so no store mutation is ever interrupted mid-flight.
#[derive(Clone)]
pub struct DispatchManager {
    inner: Arc<Inner>,
}

impl DispatchManager {
    /// Create an engine over the given store and client-event sink.
    #[must_use]
    pub fn new(
        store: Arc<dyn MessageStore>,
        sink: Arc<dyn ClientEventSink>,
        config: DispatchConfig,
    ) -> Self {
        let signal = Arc::new(VersionSignal::with_wait_max(config.wait_max()));
        let expiry = Arc::new(ExpirationTask::new(
            Arc::clone(&store),
            config.clean_interval(),
        ));

        Self {
            inner: Arc::new(Inner {
                store,
                sink,
                config,
                signal,
                shutdown: CancellationToken::new(),
                expiry,
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Register the topic listener and launch the workers.
    ///
    /// Re-entry is a no-op. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::SeqCst) {
            debug!("Dispatch engine already running");
            return;
        }

        metrics::init_metrics();

        inner
            .store
            .register_topic_listener(Arc::new(TopicEventBridge {
                signal: Arc::clone(&inner.signal),
            }));

        tokio::spawn(
            DispatchWorker::new(
                Arc::clone(&inner.store),
                inner.config.clone(),
                Arc::clone(&inner.signal),
                inner.shutdown.clone(),
            )
            .run(),
        );

        tokio::spawn(
            NotificationWorker::new(
                Arc::clone(&inner.store),
                Arc::clone(&inner.sink),
                inner.config.notification_interval(),
                inner.shutdown.clone(),
            )
            .run(),
        );

        tokio::spawn(
            Arc::clone(&inner.expiry).run_scheduler(inner.shutdown.clone()),
        );

        info!("Dispatch engine started");
    }

    /// Signal the workers and the expiration task to stop.
    ///
    /// Cooperative: each worker finishes its current iteration first.
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
        self.inner.expiry.cancel();
        info!("Dispatch engine stopping");
    }

    /// Reclaim at least `bytes_wanted` bytes of message payloads, as
    /// chosen by the store's eviction policy. Returns once applied.
    pub fn evict(&self, bytes_wanted: u64) {
        let victims = match self.inner.store.evictable_messages(bytes_wanted) {
            Ok(victims) => victims,
            Err(e) => {
                error!(bytes_wanted, error = %e, "Failed to query evictable messages");
                return;
            }
        };
        if victims.is_empty() {
            debug!(bytes_wanted, "Nothing evictable");
            return;
        }

        match self
            .inner
            .store
            .remove_messages(&victims, RemovalReason::Evicted)
        {
            Ok(()) => {
                metrics::record_evicted(victims.len());
                info!(count = victims.len(), bytes_wanted, "Evicted messages under memory pressure");
            }
            Err(e) => {
                error!(bytes_wanted, error = %e, "Failed to evict messages");
            }
        }
    }

    /// Update the expiration task's period. Non-positive values are
    /// ignored.
    pub fn set_expiration_interval(&self, interval_ms: i64) {
        if interval_ms <= 0 {
            return;
        }
        self.inner
            .expiry
            .set_interval(Duration::from_millis(interval_ms as u64));
    }
}
