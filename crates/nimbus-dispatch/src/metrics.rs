//! Metrics instrumentation for the dispatch engine.
//!
//! Uses the `metrics` facade; the host process decides how the values
//! are exported.

use nimbus_core::RemovalReason;

/// Metric names.
pub mod names {
    pub const MESSAGES_ASSIGNED_TOTAL: &str = "nimbus_pubsub_messages_assigned_total";
    pub const MESSAGES_REVOKED_TOTAL: &str = "nimbus_pubsub_messages_revoked_total";
    pub const MESSAGES_REMOVED_TOTAL: &str = "nimbus_pubsub_messages_removed_total";
    pub const MESSAGES_EXPIRED_TOTAL: &str = "nimbus_pubsub_messages_expired_total";
    pub const MESSAGES_EVICTED_TOTAL: &str = "nimbus_pubsub_messages_evicted_total";
    pub const SUBSCRIPTIONS_PRUNED_TOTAL: &str = "nimbus_pubsub_subscriptions_pruned_total";
    pub const CLIENTS_NOTIFIED_TOTAL: &str = "nimbus_pubsub_clients_notified_total";
}

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::MESSAGES_ASSIGNED_TOTAL,
        "Total messages bound to a subscriber by the dispatch worker"
    );
    metrics::describe_counter!(
        names::MESSAGES_REVOKED_TOTAL,
        "Total assignments revoked after the acknowledgement timeout"
    );
    metrics::describe_counter!(
        names::MESSAGES_REMOVED_TOTAL,
        "Total messages removed from the store, by reason"
    );
    metrics::describe_counter!(
        names::MESSAGES_EXPIRED_TOTAL,
        "Total messages removed by the expiration task"
    );
    metrics::describe_counter!(
        names::MESSAGES_EVICTED_TOTAL,
        "Total messages evicted under memory pressure"
    );
    metrics::describe_counter!(
        names::SUBSCRIPTIONS_PRUNED_TOTAL,
        "Total inactive subscriptions removed by the dispatch worker"
    );
    metrics::describe_counter!(
        names::CLIENTS_NOTIFIED_TOTAL,
        "Total poll hints sent to clients with pending deliveries"
    );
}

/// Record a successful message assignment.
pub fn record_assigned() {
    metrics::counter!(names::MESSAGES_ASSIGNED_TOTAL).increment(1);
}

/// Record a revoked assignment.
pub fn record_revoked() {
    metrics::counter!(names::MESSAGES_REVOKED_TOTAL).increment(1);
}

/// Record removed messages, labelled by reason.
pub fn record_removed(reason: RemovalReason, count: usize) {
    metrics::counter!(names::MESSAGES_REMOVED_TOTAL, "reason" => reason.as_str())
        .increment(count as u64);
}

/// Record messages removed by the expiration task.
pub fn record_expired(count: usize) {
    metrics::counter!(names::MESSAGES_EXPIRED_TOTAL).increment(count as u64);
}

/// Record messages evicted under memory pressure.
pub fn record_evicted(count: usize) {
    metrics::counter!(names::MESSAGES_EVICTED_TOTAL).increment(count as u64);
}

/// Record an inactive subscription removal.
pub fn record_subscription_pruned() {
    metrics::counter!(names::SUBSCRIPTIONS_PRUNED_TOTAL).increment(1);
}

/// Record poll hints sent to clients.
pub fn record_clients_notified(count: usize) {
    metrics::counter!(names::CLIENTS_NOTIFIED_TOTAL).increment(count as u64);
}
