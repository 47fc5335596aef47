//! Event surfaces between the store, the engine and the client layer.

/// Event code carried by pub/sub poll notifications.
///
/// Opaque protocol constant; clients match on it to trigger a poll of
/// their pending deliveries. Preserved verbatim across the wire.
pub const PUBSUB_POLL_EVENT_CODE: i32 = 11;

/// Category of a client event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientEventType {
    /// Pub/sub subsystem events.
    PubSub,
}

/// Receiver for topic events emitted by the store.
///
/// Called on store-owned threads; implementations must stay bounded (a
/// counter bump plus a wake). The size/count hooks default to no-ops
/// and exist for metrics integrations.
pub trait TopicListener: Send + Sync {
    /// A subscription was attached to `topic`.
    fn on_subscription_created(&self, topic: &str);

    /// A subscription was detached from `topic`.
    fn on_subscription_removed(&self, topic: &str);

    /// A message was published to `topic`.
    fn on_message_arrived(&self, topic: &str);

    /// A message on `topic` was acknowledged by its assignee.
    fn on_message_delivered(&self, topic: &str);

    /// The byte size accounted to `topic` changed by `delta`.
    fn on_size_changed(&self, _topic: &str, _delta: i64) {}

    /// The message count of `topic` changed by `delta`.
    fn on_count_changed(&self, _topic: &str, _delta: i64) {}
}

/// Callback surface used to wake clients that have pending deliveries.
///
/// The notification worker invokes this once per notifiable client per
/// tick; the implementation forwards the hint over the client's poll
/// channel.
pub trait ClientEventSink: Send + Sync {
    /// Deliver an event hint to a connected client.
    fn notify_client(&self, client_id: &str, event_code: i32, event_type: ClientEventType);
}
