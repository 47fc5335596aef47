//! Message model for the Nimbus pub/sub subsystem.
//!
//! The dispatch engine never touches message payloads; it works on the
//! metadata snapshots defined here. Payload bytes stay inside the store.

use crate::subscription::SubscriptionInfo;
use std::fmt;

/// A unique, store-assigned message identifier.
pub type MessageId = u64;

/// A topic name.
pub type TopicName = String;

/// A client identifier.
pub type ClientId = String;

/// The (topic, id) identity of a message, used by bulk store operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// Topic the message was published to.
    pub topic: TopicName,
    /// Store-assigned message identifier, unique within the topic.
    pub id: MessageId,
}

impl MessageRef {
    /// Create a new message reference.
    #[must_use]
    pub fn new(topic: impl Into<TopicName>, id: MessageId) -> Self {
        Self {
            topic: topic.into(),
            id,
        }
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.id)
    }
}

/// How a message is delivered to the topic's subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryOption {
    /// Exactly one eligible subscriber receives the message.
    #[default]
    Any,
    /// Every eligible subscriber receives the message (fan-out).
    All,
}

/// Assignment state of a message.
///
/// Transitions: `Unassigned -> Assigned -> Delivered -> removed`, with
/// the backward edge `Assigned -> Unassigned` when the acknowledgement
/// deadline lapses. `Delivered` is only reachable from `Assigned`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AssignmentState {
    /// Published but not yet bound to a subscriber.
    #[default]
    Unassigned,
    /// Bound to a subscription, awaiting acknowledgement.
    Assigned(SubscriptionInfo),
    /// Acknowledged by the assignee; eligible for cleanup.
    Delivered,
}

impl AssignmentState {
    /// Returns `true` if the message is awaiting assignment.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        matches!(self, Self::Unassigned)
    }

    /// Returns `true` if the message is bound to a subscription.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    /// The subscription this message is bound to, if any.
    #[must_use]
    pub fn assignee(&self) -> Option<&SubscriptionInfo> {
        match self {
            Self::Assigned(sub) => Some(sub),
            _ => None,
        }
    }
}

/// Engine-visible snapshot of a message.
///
/// Returned by store queries; holds everything the dispatch phases need
/// to decide what to do with the message.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    /// Identity of the message.
    pub msg_ref: MessageRef,
    /// Delivery option chosen at publish time.
    pub delivery: DeliveryOption,
    /// Current assignment state.
    pub state: AssignmentState,
    /// Payload size in bytes, as accounted by the store.
    pub payload_size: u64,
}

impl MessageInfo {
    /// The topic this message belongs to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.msg_ref.topic
    }

    /// The store-assigned message id.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.msg_ref.id
    }
}

/// Why a batch of messages is being removed from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Acknowledged by the assignee and garbage-collected.
    Delivered,
    /// Past the message's absolute expiry time.
    Expired,
    /// Reclaimed under memory pressure.
    Evicted,
    /// Dropped because it can no longer be delivered (e.g. the topic
    /// lost its publisher before delivery completed).
    Removed,
}

impl RemovalReason {
    /// Stable label used for logging and metric dimensions.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Expired => "expired",
            Self::Evicted => "evicted",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
