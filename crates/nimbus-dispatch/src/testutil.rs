//! In-memory store double used by the engine tests.
//!
//! Implements the full `MessageStore` contract over plain maps, with
//! seeding and inspection helpers the tests drive scenarios through.
//! Single-message queries hand out the first match in topic order, so
//! tests are deterministic.

use nimbus_core::{
    AssignmentKind, AssignmentState, ClientEventSink, ClientEventType, ClientId, DeliveryOption,
    MessageId, MessageInfo, MessageRef, MessageStore, OperationContext, RemovalReason, StoreError,
    SubscriptionInfo, SubscriptionRole, TopicListener, TopicName, TopicOperation,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct StoredSubscription {
    client_id: ClientId,
    role: SubscriptionRole,
    last_active: Instant,
}

struct StoredMessage {
    id: MessageId,
    delivery: DeliveryOption,
    state: AssignmentState,
    assigned_at: Option<Instant>,
    expires_at: Option<Instant>,
    payload_size: u64,
}

#[derive(Default)]
struct TopicState {
    subscriptions: Vec<StoredSubscription>,
    messages: Vec<StoredMessage>,
    rr_cursors: HashMap<SubscriptionRole, usize>,
}

#[derive(Default)]
struct Inner {
    topics: BTreeMap<TopicName, TopicState>,
    removed: Vec<(MessageRef, RemovalReason)>,
    pending_polls: Vec<ClientId>,
    fail_unacknowledged: bool,
    subscriber_lookups: HashMap<TopicName, usize>,
}

/// In-memory `MessageStore` implementation for tests.
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
    listener: Mutex<Option<Arc<dyn TopicListener>>>,
    registrations: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            listener: Mutex::new(None),
            registrations: AtomicUsize::new(0),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    fn notify(&self, f: impl FnOnce(&dyn TopicListener)) {
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            f(&*listener);
        }
    }

    // -- seeding helpers --------------------------------------------------

    pub(crate) fn subscribe(&self, topic: &str, client: &str, role: SubscriptionRole) {
        self.subscribe_at(topic, client, role, Instant::now());
        self.notify(|l| l.on_subscription_created(topic));
    }

    /// Subscribe with a last-activity timestamp `idle_for` in the past.
    pub(crate) fn subscribe_idle(
        &self,
        topic: &str,
        client: &str,
        role: SubscriptionRole,
        idle_for: Duration,
    ) {
        let last_active = Instant::now()
            .checked_sub(idle_for)
            .expect("idle_for too large for test clock");
        self.subscribe_at(topic, client, role, last_active);
    }

    fn subscribe_at(&self, topic: &str, client: &str, role: SubscriptionRole, last_active: Instant) {
        self.with_inner(|inner| {
            inner
                .topics
                .entry(topic.to_string())
                .or_default()
                .subscriptions
                .push(StoredSubscription {
                    client_id: client.to_string(),
                    role,
                    last_active,
                });
        });
    }

    pub(crate) fn publish(&self, topic: &str, id: MessageId, delivery: DeliveryOption) {
        self.publish_message(topic, id, delivery, None, 1024);
    }

    /// Publish a message that is already past its expiry time.
    pub(crate) fn publish_expired(&self, topic: &str, id: MessageId, delivery: DeliveryOption) {
        let expired_at = Instant::now()
            .checked_sub(Duration::from_millis(10))
            .expect("test clock too young");
        self.publish_message(topic, id, delivery, Some(expired_at), 1024);
    }

    pub(crate) fn publish_sized(
        &self,
        topic: &str,
        id: MessageId,
        delivery: DeliveryOption,
        payload_size: u64,
    ) {
        self.publish_message(topic, id, delivery, None, payload_size);
    }

    fn publish_message(
        &self,
        topic: &str,
        id: MessageId,
        delivery: DeliveryOption,
        expires_at: Option<Instant>,
        payload_size: u64,
    ) {
        self.with_inner(|inner| {
            inner
                .topics
                .entry(topic.to_string())
                .or_default()
                .messages
                .push(StoredMessage {
                    id,
                    delivery,
                    state: AssignmentState::Unassigned,
                    assigned_at: None,
                    expires_at,
                    payload_size,
                });
        });
        self.notify(|l| l.on_message_arrived(topic));
    }

    /// Acknowledge an assigned message, as the assignee would.
    pub(crate) fn acknowledge(&self, topic: &str, id: MessageId) {
        self.with_inner(|inner| {
            let msg = inner
                .topics
                .get_mut(topic)
                .and_then(|t| t.messages.iter_mut().find(|m| m.id == id))
                .expect("unknown message");
            assert!(msg.state.is_assigned(), "acknowledged an unassigned message");
            msg.state = AssignmentState::Delivered;
        });
        self.notify(|l| l.on_message_delivered(topic));
    }

    /// Force a message into `Assigned(client)` with a fresh timestamp.
    pub(crate) fn seed_assignment(&self, topic: &str, id: MessageId, client: &str) {
        self.with_inner(|inner| {
            let msg = inner
                .topics
                .get_mut(topic)
                .and_then(|t| t.messages.iter_mut().find(|m| m.id == id))
                .expect("unknown message");
            msg.state = AssignmentState::Assigned(SubscriptionInfo::new(
                topic,
                client,
                SubscriptionRole::Subscriber,
            ));
            msg.assigned_at = Some(Instant::now());
        });
    }

    /// Move an assignment timestamp `age` into the past.
    pub(crate) fn backdate_assignment(&self, topic: &str, id: MessageId, age: Duration) {
        let assigned_at = Instant::now()
            .checked_sub(age)
            .expect("age too large for test clock");
        self.with_inner(|inner| {
            let msg = inner
                .topics
                .get_mut(topic)
                .and_then(|t| t.messages.iter_mut().find(|m| m.id == id))
                .expect("unknown message");
            assert!(msg.state.is_assigned(), "backdated an unassigned message");
            msg.assigned_at = Some(assigned_at);
        });
    }

    pub(crate) fn set_pending_polls(&self, clients: &[&str]) {
        self.with_inner(|inner| {
            inner.pending_polls = clients.iter().map(|c| c.to_string()).collect();
        });
    }

    /// Make `unacknowledged_messages` fail until reset.
    pub(crate) fn fail_unacknowledged_queries(&self, fail: bool) {
        self.with_inner(|inner| inner.fail_unacknowledged = fail);
    }

    // -- inspection helpers -----------------------------------------------

    pub(crate) fn assignment_of(&self, topic: &str, id: MessageId) -> Option<AssignmentState> {
        self.with_inner(|inner| {
            inner
                .topics
                .get(topic)
                .and_then(|t| t.messages.iter().find(|m| m.id == id))
                .map(|m| m.state.clone())
        })
    }

    pub(crate) fn removed_with(&self, reason: RemovalReason) -> Vec<MessageRef> {
        self.with_inner(|inner| {
            inner
                .removed
                .iter()
                .filter(|(_, r)| *r == reason)
                .map(|(m, _)| m.clone())
                .collect()
        })
    }

    pub(crate) fn message_count(&self, topic: &str) -> usize {
        self.with_inner(|inner| inner.topics.get(topic).map_or(0, |t| t.messages.len()))
    }

    pub(crate) fn assigned_count(&self, topic: &str) -> usize {
        self.with_inner(|inner| {
            inner.topics.get(topic).map_or(0, |t| {
                t.messages.iter().filter(|m| m.state.is_assigned()).count()
            })
        })
    }

    /// Number of balancing lookups (`Subscriber` role) served for a
    /// topic.
    pub(crate) fn subscriber_lookups(&self, topic: &str) -> usize {
        self.with_inner(|inner| inner.subscriber_lookups.get(topic).copied().unwrap_or(0))
    }

    pub(crate) fn listener_registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

impl MessageStore for MemoryStore {
    fn register_topic_listener(&self, listener: Arc<dyn TopicListener>) {
        *self.listener.lock().unwrap() = Some(listener);
        self.registrations.fetch_add(1, Ordering::SeqCst);
    }

    fn inactive_client_subscriptions(
        &self,
        threshold: Duration,
    ) -> Result<HashMap<TopicName, Vec<ClientId>>, StoreError> {
        let now = Instant::now();
        Ok(self.with_inner(|inner| {
            let mut result: HashMap<TopicName, Vec<ClientId>> = HashMap::new();
            for (topic, state) in &inner.topics {
                for sub in &state.subscriptions {
                    if now.duration_since(sub.last_active) > threshold {
                        let clients = result.entry(topic.clone()).or_default();
                        if !clients.contains(&sub.client_id) {
                            clients.push(sub.client_id.clone());
                        }
                    }
                }
            }
            result
        }))
    }

    fn topic_operation(&self, op: TopicOperation, _ctx: OperationContext) -> Result<(), StoreError> {
        match op {
            TopicOperation::Subscribe {
                topic,
                subscription,
            } => {
                let client = subscription
                    .client_id
                    .clone()
                    .ok_or_else(|| StoreError::Internal("subscribe without client".into()))?;
                self.subscribe_at(&topic, &client, subscription.role, Instant::now());
                self.notify(|l| l.on_subscription_created(&topic));
                Ok(())
            }
            TopicOperation::Unsubscribe {
                topic,
                subscription,
            } => {
                let found = self.with_inner(|inner| {
                    let Some(state) = inner.topics.get_mut(&topic) else {
                        return false;
                    };
                    let before = state.subscriptions.len();
                    state.subscriptions.retain(|s| {
                        subscription.client_id.as_ref() != Some(&s.client_id)
                            || s.role != subscription.role
                    });
                    state.subscriptions.len() != before
                });
                if !found {
                    return Err(StoreError::SubscriptionNotFound(subscription));
                }
                self.notify(|l| l.on_subscription_removed(&topic));
                Ok(())
            }
            _ => Err(StoreError::Internal("unsupported topic operation".into())),
        }
    }

    fn next_unassigned_message(&self) -> Result<Option<MessageInfo>, StoreError> {
        Ok(self.with_inner(|inner| {
            for (topic, state) in &inner.topics {
                if let Some(msg) = state.messages.iter().find(|m| m.state.is_unassigned()) {
                    return Some(MessageInfo {
                        msg_ref: MessageRef::new(topic.clone(), msg.id),
                        delivery: msg.delivery,
                        state: msg.state.clone(),
                        payload_size: msg.payload_size,
                    });
                }
            }
            None
        }))
    }

    fn next_undelivered_message(&self) -> Result<Option<MessageInfo>, StoreError> {
        Ok(self.with_inner(|inner| {
            for (topic, state) in &inner.topics {
                if let Some(msg) = state.messages.iter().find(|m| m.state.is_assigned()) {
                    return Some(MessageInfo {
                        msg_ref: MessageRef::new(topic.clone(), msg.id),
                        delivery: msg.delivery,
                        state: msg.state.clone(),
                        payload_size: msg.payload_size,
                    });
                }
            }
            None
        }))
    }

    fn unacknowledged_messages(&self, timeout: Duration) -> Result<Vec<MessageInfo>, StoreError> {
        let now = Instant::now();
        self.with_inner(|inner| {
            if inner.fail_unacknowledged {
                return Err(StoreError::Internal("injected failure".into()));
            }
            let mut result = Vec::new();
            for (topic, state) in &inner.topics {
                for msg in &state.messages {
                    let timed_out = msg.state.is_assigned()
                        && msg
                            .assigned_at
                            .is_some_and(|at| now.duration_since(at) > timeout);
                    if timed_out {
                        result.push(MessageInfo {
                            msg_ref: MessageRef::new(topic.clone(), msg.id),
                            delivery: msg.delivery,
                            state: msg.state.clone(),
                            payload_size: msg.payload_size,
                        });
                    }
                }
            }
            Ok(result)
        })
    }

    fn subscriber(
        &self,
        topic: &str,
        role: SubscriptionRole,
    ) -> Result<Option<SubscriptionInfo>, StoreError> {
        Ok(self.with_inner(|inner| {
            if role == SubscriptionRole::Subscriber {
                *inner
                    .subscriber_lookups
                    .entry(topic.to_string())
                    .or_default() += 1;
            }
            let state = inner.topics.get_mut(topic)?;
            let candidates: Vec<ClientId> = state
                .subscriptions
                .iter()
                .filter(|s| s.role == role)
                .map(|s| s.client_id.clone())
                .collect();
            if candidates.is_empty() {
                return None;
            }
            let cursor = state.rr_cursors.entry(role).or_default();
            let client = candidates[*cursor % candidates.len()].clone();
            *cursor += 1;
            Some(SubscriptionInfo::new(topic, client, role))
        }))
    }

    fn assignment_operation(
        &self,
        message: &MessageRef,
        subscription: Option<&SubscriptionInfo>,
        kind: AssignmentKind,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            let msg = inner
                .topics
                .get_mut(&message.topic)
                .and_then(|t| t.messages.iter_mut().find(|m| m.id == message.id))
                .ok_or_else(|| StoreError::MessageNotFound(message.clone()))?;
            match kind {
                AssignmentKind::Assign => {
                    let sub = subscription.ok_or_else(|| {
                        StoreError::InvalidTransition("assign without subscription".into())
                    })?;
                    msg.state = AssignmentState::Assigned(sub.clone());
                    msg.assigned_at = Some(Instant::now());
                }
                AssignmentKind::Revoke => {
                    msg.state = AssignmentState::Unassigned;
                    msg.assigned_at = None;
                }
            }
            Ok(())
        })
    }

    fn delivered_messages(&self) -> Result<Vec<MessageRef>, StoreError> {
        Ok(self.with_inner(|inner| {
            inner
                .topics
                .iter()
                .flat_map(|(topic, state)| {
                    state
                        .messages
                        .iter()
                        .filter(|m| m.state == AssignmentState::Delivered)
                        .map(|m| MessageRef::new(topic.clone(), m.id))
                })
                .collect()
        }))
    }

    fn remove_messages(
        &self,
        messages: &[MessageRef],
        reason: RemovalReason,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            for msg_ref in messages {
                let Some(state) = inner.topics.get_mut(&msg_ref.topic) else {
                    continue;
                };
                let before = state.messages.len();
                state.messages.retain(|m| m.id != msg_ref.id);
                if state.messages.len() != before {
                    inner.removed.push((msg_ref.clone(), reason));
                }
            }
        });
        Ok(())
    }

    fn expired_messages(&self) -> Result<Vec<MessageRef>, StoreError> {
        let now = Instant::now();
        Ok(self.with_inner(|inner| {
            inner
                .topics
                .iter()
                .flat_map(|(topic, state)| {
                    state
                        .messages
                        .iter()
                        .filter(|m| m.expires_at.is_some_and(|at| at <= now))
                        .map(|m| MessageRef::new(topic.clone(), m.id))
                })
                .collect()
        }))
    }

    fn evictable_messages(&self, bytes_wanted: u64) -> Result<Vec<MessageRef>, StoreError> {
        Ok(self.with_inner(|inner| {
            let mut victims = Vec::new();
            let mut reclaimed = 0;
            'scan: for (topic, state) in &inner.topics {
                for msg in &state.messages {
                    victims.push(MessageRef::new(topic.clone(), msg.id));
                    reclaimed += msg.payload_size;
                    if reclaimed >= bytes_wanted {
                        break 'scan;
                    }
                }
            }
            victims
        }))
    }

    fn notifiable_clients(&self) -> Result<Vec<ClientId>, StoreError> {
        Ok(self.with_inner(|inner| std::mem::take(&mut inner.pending_polls)))
    }
}

/// Client-event sink that records every hint it receives.
pub(crate) struct RecordingSink {
    events: Mutex<Vec<(ClientId, i32, ClientEventType)>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn events(&self) -> Vec<(ClientId, i32, ClientEventType)> {
        self.events.lock().unwrap().clone()
    }
}

impl ClientEventSink for RecordingSink {
    fn notify_client(&self, client_id: &str, event_code: i32, event_type: ClientEventType) {
        self.events
            .lock()
            .unwrap()
            .push((client_id.to_string(), event_code, event_type));
    }
}
