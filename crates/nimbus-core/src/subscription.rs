//! Subscription model for the Nimbus pub/sub subsystem.

use crate::message::{ClientId, TopicName};
use std::fmt;

/// The role a subscription plays on its topic.
///
/// Publishers confirm delivery of their messages; subscribers receive
/// them. A client may hold one subscription per (topic, role) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionRole {
    /// Publishes messages and confirms their delivery.
    Publisher,
    /// Receives assigned messages and acknowledges them.
    Subscriber,
}

impl fmt::Display for SubscriptionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publisher => f.write_str("publisher"),
            Self::Subscriber => f.write_str("subscriber"),
        }
    }
}

/// A client's registered interest in a topic, in a specific role.
///
/// `client_id == None` is the synthetic fan-out marker: a message with
/// delivery option `All` is assigned to this marker and the store
/// expands it to every eligible subscriber downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionInfo {
    /// Topic the subscription is attached to.
    pub topic: TopicName,
    /// Subscribing client, or `None` for the fan-out marker.
    pub client_id: Option<ClientId>,
    /// Role of the subscription on the topic.
    pub role: SubscriptionRole,
}

impl SubscriptionInfo {
    /// Create a subscription for a concrete client.
    #[must_use]
    pub fn new(
        topic: impl Into<TopicName>,
        client_id: impl Into<ClientId>,
        role: SubscriptionRole,
    ) -> Self {
        Self {
            topic: topic.into(),
            client_id: Some(client_id.into()),
            role,
        }
    }

    /// Create the synthetic fan-out marker for a topic.
    ///
    /// The marker always carries the `Subscriber` role; the store
    /// interprets an assignment to it as fan-out to all subscribers.
    #[must_use]
    pub fn fan_out(topic: impl Into<TopicName>) -> Self {
        Self {
            topic: topic.into(),
            client_id: None,
            role: SubscriptionRole::Subscriber,
        }
    }

    /// Returns `true` if this is the synthetic fan-out marker.
    #[must_use]
    pub fn is_fan_out(&self) -> bool {
        self.client_id.is_none()
    }
}

impl fmt::Display for SubscriptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.client_id {
            Some(client) => write!(f, "{}:{}:{}", self.topic, client, self.role),
            None => write!(f, "{}:*:{}", self.topic, self.role),
        }
    }
}
