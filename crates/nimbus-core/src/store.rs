//! Store façade consumed by the dispatch engine.
//!
//! The message store owns all topics, subscriptions and messages; it is
//! internally synchronized and may be backed by a local or replicated
//! implementation. The engine holds no long-lived references into it:
//! it reads via the queries below and mutates via the operations below,
//! which keeps the engine stateless apart from its version signal and
//! shutdown flag.

use crate::event::TopicListener;
use crate::message::{ClientId, MessageInfo, MessageRef, RemovalReason, TopicName};
use crate::subscription::{SubscriptionInfo, SubscriptionRole};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Store errors surfaced to the engine.
///
/// The engine never propagates these to its callers; each one becomes a
/// log entry plus a local decision (skip the item, abort the phase, or
/// exit the worker).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named topic does not exist.
    #[error("Topic not found: {0}")]
    TopicNotFound(TopicName),

    /// The referenced message is no longer in the store.
    #[error("Message not found: {0}")]
    MessageNotFound(MessageRef),

    /// The referenced subscription does not exist.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionInfo),

    /// The requested assignment transition is not legal from the
    /// message's current state.
    #[error("Invalid assignment transition: {0}")]
    InvalidTransition(String),

    /// Internal store failure.
    #[error("Internal store error: {0}")]
    Internal(String),
}

/// A topic-level mutation applied through the store.
///
/// The store supports further operations outside the dispatch core.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TopicOperation {
    /// Attach a subscription to a topic.
    Subscribe {
        /// Target topic.
        topic: TopicName,
        /// Subscription to attach.
        subscription: SubscriptionInfo,
    },
    /// Detach a subscription from a topic.
    Unsubscribe {
        /// Target topic.
        topic: TopicName,
        /// Subscription to detach.
        subscription: SubscriptionInfo,
    },
}

/// An assignment-state transition applied to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// Bind the message to the given subscription (`Unassigned ->
    /// Assigned`, or refresh an existing assignment).
    Assign,
    /// Undo the current assignment (`Assigned -> Unassigned`).
    Revoke,
}

/// Caller context attached to store mutations.
///
/// Engine-issued mutations are tagged internal so the store skips
/// external-caller authorization and accounting for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationContext {
    /// `true` when the mutation originates inside the cache node.
    pub internal: bool,
}

impl OperationContext {
    /// Context for engine-originated operations.
    #[must_use]
    pub const fn internal() -> Self {
        Self { internal: true }
    }

    /// Context for client-originated operations.
    #[must_use]
    pub const fn external() -> Self {
        Self { internal: false }
    }
}

/// Abstract view of the message store.
///
/// Every method is expected to be internally synchronized; the engine
/// never holds a lock of its own across a call. Single-message queries
/// (`next_unassigned_message`, `next_undelivered_message`) hand out one
/// candidate per call so the dispatch phases can bound their work.
pub trait MessageStore: Send + Sync {
    /// Install a callback receiver for topic events.
    ///
    /// The store invokes the listener on its own threads; listener
    /// implementations must be bounded (counter bump and wake only).
    fn register_topic_listener(&self, listener: Arc<dyn TopicListener>);

    /// Client subscriptions whose last activity is older than
    /// `threshold`, grouped by topic.
    fn inactive_client_subscriptions(
        &self,
        threshold: Duration,
    ) -> Result<HashMap<TopicName, Vec<ClientId>>, StoreError>;

    /// Apply a topic-level mutation.
    fn topic_operation(&self, op: TopicOperation, ctx: OperationContext) -> Result<(), StoreError>;

    /// One message currently in `Unassigned`, or `None`.
    fn next_unassigned_message(&self) -> Result<Option<MessageInfo>, StoreError>;

    /// One message currently in `Assigned` whose assignee has not yet
    /// acknowledged it, or `None`. Used by the publisher-recheck phase.
    fn next_undelivered_message(&self) -> Result<Option<MessageInfo>, StoreError>;

    /// Messages in `Assigned` whose assignment age exceeds `timeout`.
    fn unacknowledged_messages(&self, timeout: Duration) -> Result<Vec<MessageInfo>, StoreError>;

    /// One eligible subscription of the given role for the topic, or
    /// `None`. Successive calls are expected to rotate across eligible
    /// subscriptions; the balancing policy is the store's.
    fn subscriber(
        &self,
        topic: &str,
        role: SubscriptionRole,
    ) -> Result<Option<SubscriptionInfo>, StoreError>;

    /// Transition a message's assignment state.
    ///
    /// `subscription` is required for [`AssignmentKind::Assign`] and
    /// ignored for [`AssignmentKind::Revoke`].
    fn assignment_operation(
        &self,
        message: &MessageRef,
        subscription: Option<&SubscriptionInfo>,
        kind: AssignmentKind,
    ) -> Result<(), StoreError>;

    /// All messages currently in `Delivered`.
    fn delivered_messages(&self) -> Result<Vec<MessageRef>, StoreError>;

    /// Remove the given messages, recording `reason`.
    fn remove_messages(
        &self,
        messages: &[MessageRef],
        reason: RemovalReason,
    ) -> Result<(), StoreError>;

    /// All messages past their absolute expiry time.
    fn expired_messages(&self) -> Result<Vec<MessageRef>, StoreError>;

    /// Messages the store's policy allows dropping under memory
    /// pressure, with combined payload size of at least `bytes_wanted`
    /// when that much is reclaimable.
    fn evictable_messages(&self, bytes_wanted: u64) -> Result<Vec<MessageRef>, StoreError>;

    /// Clients with deliveries pending since their last poll
    /// notification.
    fn notifiable_clients(&self) -> Result<Vec<ClientId>, StoreError>;
}
