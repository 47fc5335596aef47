//! The dispatch worker: the engine's main loop.
//!
//! One long-running task per engine. Every iteration runs the five
//! dispatch phases in a fixed order, then parks on the version signal
//! until a topic event arrives, the wait bound elapses, or an earlier
//! phase deferred work past its fairness cap.
//!
//! Phase order matters: revoking stale assignments before assigning new
//! ones recycles work quickly, removing inactive clients before
//! assigning prevents doomed assignments, and delivered-cleanup runs
//! last to coalesce with the work of the earlier phases.

use crate::config::DispatchConfig;
use crate::metrics;
use nimbus_core::{
    AssignmentKind, DeliveryOption, MessageRef, MessageStore, OperationContext, RemovalReason,
    StoreError, SubscriptionInfo, SubscriptionRole, TopicOperation, VersionSignal,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// The dispatch worker.
///
/// Holds no state of its own beyond handles: the store is the
/// concurrency boundary, and serializing the phases inside a single
/// task keeps their ordering trivial to reason about.
pub(crate) struct DispatchWorker {
    store: Arc<dyn MessageStore>,
    config: DispatchConfig,
    signal: Arc<VersionSignal>,
    shutdown: CancellationToken,
}

impl DispatchWorker {
    pub(crate) fn new(
        store: Arc<dyn MessageStore>,
        config: DispatchConfig,
        signal: Arc<VersionSignal>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            config,
            signal,
            shutdown,
        }
    }

    /// Run until cancelled.
    pub(crate) async fn run(self) {
        info!("Dispatch worker started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let seen = self.signal.current();
            let had_pending_work = self.run_iteration();

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,
                () = self.signal.wait_for_update(seen, had_pending_work) => {}
            }
        }

        info!("Dispatch worker stopped");
    }

    /// Run the five dispatch phases once, in order.
    ///
    /// Returns `true` when any phase hit its fairness cap and deferred
    /// work, in which case the caller must not sleep. A failing phase
    /// is logged and aborted; the remaining phases still run.
    fn run_iteration(&self) -> bool {
        let mut pending = false;
        pending |= self.run_phase("revoke_expired_assignments", || {
            self.revoke_expired_assignments()
        });
        pending |= self.run_phase("remove_inactive_clients", || self.remove_inactive_clients());
        pending |= self.run_phase("assign_pending_messages", || self.assign_pending_messages());
        pending |= self.run_phase("assign_delivery_messages", || self.assign_delivery_messages());
        pending |= self.run_phase("remove_delivered_messages", || {
            self.remove_delivered_messages()
        });
        pending
    }

    fn run_phase(&self, name: &'static str, phase: impl FnOnce() -> Result<bool, StoreError>) -> bool {
        match phase() {
            Ok(pending) => pending,
            Err(e) => {
                error!(phase = name, error = %e, "Dispatch phase failed");
                false
            }
        }
    }

    /// Phase 1: return timed-out assignments to the unassigned pool.
    fn revoke_expired_assignments(&self) -> Result<bool, StoreError> {
        let timed_out = self
            .store
            .unacknowledged_messages(self.config.assignment_timeout())?;
        let capped = timed_out.len() > self.config.fairness_cap;

        for msg in timed_out.iter().take(self.config.fairness_cap) {
            match self
                .store
                .assignment_operation(&msg.msg_ref, None, AssignmentKind::Revoke)
            {
                Ok(()) => {
                    metrics::record_revoked();
                    debug!(message = %msg.msg_ref, "Revoked timed-out assignment");
                }
                Err(e) => {
                    error!(message = %msg.msg_ref, error = %e, "Failed to revoke assignment");
                }
            }
        }

        Ok(capped)
    }

    /// Phase 2: unsubscribe clients idle past the inactivity threshold.
    ///
    /// The store reports inactive clients without their roles, so the
    /// detach is issued for both roles; a missing subscription in one
    /// of them is not an error.
    fn remove_inactive_clients(&self) -> Result<bool, StoreError> {
        let inactive = self
            .store
            .inactive_client_subscriptions(self.config.inactivity_threshold())?;

        let mut processed = 0;
        for (topic, clients) in inactive {
            for client in clients {
                if processed == self.config.fairness_cap {
                    return Ok(true);
                }
                processed += 1;

                for role in [SubscriptionRole::Publisher, SubscriptionRole::Subscriber] {
                    let subscription = SubscriptionInfo::new(topic.clone(), client.clone(), role);
                    let op = TopicOperation::Unsubscribe {
                        topic: topic.clone(),
                        subscription,
                    };
                    match self.store.topic_operation(op, OperationContext::internal()) {
                        Ok(()) => {
                            metrics::record_subscription_pruned();
                            info!(topic = %topic, client = %client, %role, "Removed inactive subscription");
                        }
                        Err(StoreError::SubscriptionNotFound(_)) => {}
                        Err(e) => {
                            error!(topic = %topic, client = %client, error = %e, "Failed to remove inactive subscription");
                        }
                    }
                }
            }
        }

        Ok(false)
    }

    /// Phase 3: bind unassigned messages to eligible subscribers.
    fn assign_pending_messages(&self) -> Result<bool, StoreError> {
        let mut seen: HashSet<MessageRef> = HashSet::new();

        for _ in 0..self.config.fairness_cap {
            let Some(msg) = self.store.next_unassigned_message()? else {
                return Ok(false);
            };
            if !seen.insert(msg.msg_ref.clone()) {
                // The store re-offered a message skipped this pass;
                // everything still unassigned stays for a later
                // iteration.
                return Ok(false);
            }

            let target = match msg.delivery {
                DeliveryOption::Any => {
                    match self
                        .store
                        .subscriber(msg.topic(), SubscriptionRole::Subscriber)
                    {
                        Ok(Some(sub)) => sub,
                        Ok(None) => continue,
                        Err(e) => {
                            error!(message = %msg.msg_ref, error = %e, "Subscriber lookup failed");
                            continue;
                        }
                    }
                }
                // Fan-out is resolved by the store; assign the marker.
                DeliveryOption::All => SubscriptionInfo::fan_out(msg.topic()),
            };

            match self
                .store
                .assignment_operation(&msg.msg_ref, Some(&target), AssignmentKind::Assign)
            {
                Ok(()) => {
                    metrics::record_assigned();
                    debug!(message = %msg.msg_ref, subscription = %target, "Assigned message");
                }
                Err(e) => {
                    error!(message = %msg.msg_ref, error = %e, "Failed to assign message");
                }
            }
        }

        Ok(true)
    }

    /// Phase 4: recheck assigned-but-undelivered messages.
    ///
    /// A message whose topic has lost its publisher can never be
    /// confirmed in the protocol's trust model, so it is dropped;
    /// otherwise the assignment is refreshed.
    fn assign_delivery_messages(&self) -> Result<bool, StoreError> {
        let mut seen: HashSet<MessageRef> = HashSet::new();

        for _ in 0..self.config.fairness_cap {
            let Some(msg) = self.store.next_undelivered_message()? else {
                return Ok(false);
            };
            if !seen.insert(msg.msg_ref.clone()) {
                return Ok(false);
            }

            let publisher = match self
                .store
                .subscriber(msg.topic(), SubscriptionRole::Publisher)
            {
                Ok(publisher) => publisher,
                Err(e) => {
                    error!(message = %msg.msg_ref, error = %e, "Publisher lookup failed");
                    continue;
                }
            };

            if publisher.is_none() {
                match self
                    .store
                    .remove_messages(std::slice::from_ref(&msg.msg_ref), RemovalReason::Removed)
                {
                    Ok(()) => {
                        metrics::record_removed(RemovalReason::Removed, 1);
                        debug!(message = %msg.msg_ref, "Removed undeliverable message without publisher");
                    }
                    Err(e) => {
                        error!(message = %msg.msg_ref, error = %e, "Failed to remove undeliverable message");
                    }
                }
                continue;
            }

            let Some(assignee) = msg.state.assignee() else {
                error!(message = %msg.msg_ref, "Undelivered message without an assignee");
                continue;
            };
            match self
                .store
                .assignment_operation(&msg.msg_ref, Some(assignee), AssignmentKind::Assign)
            {
                Ok(()) => {
                    debug!(message = %msg.msg_ref, subscription = %assignee, "Refreshed assignment");
                }
                Err(e) => {
                    error!(message = %msg.msg_ref, error = %e, "Failed to refresh assignment");
                }
            }
        }

        Ok(true)
    }

    /// Phase 5: garbage-collect acknowledged messages.
    fn remove_delivered_messages(&self) -> Result<bool, StoreError> {
        let delivered = self.store.delivered_messages()?;
        if delivered.is_empty() {
            return Ok(false);
        }

        self.store
            .remove_messages(&delivered, RemovalReason::Delivered)?;
        metrics::record_removed(RemovalReason::Delivered, delivered.len());
        debug!(count = delivered.len(), "Removed delivered messages");

        Ok(false)
    }
}
