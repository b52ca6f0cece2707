//! Ordered, deduplicating in-process queue.
//!
//! [`InMemoryQueue`] gives the pipeline the delivery semantics it assumes
//! from a session-enabled message broker:
//!
//! - **Per-group FIFO.** Messages sharing a group key are delivered one at a
//!   time, in publish order. The next message of a group only becomes
//!   deliverable once its predecessor has been acknowledged or returned.
//! - **At-least-once.** A delivered message is held under a visibility lease.
//!   If the lease expires before an ack, the message is redelivered.
//! - **Dedup-key suppression.** Publishing a message whose dedup key has
//!   already been accepted is a silent no-op.
//! - **Dead-lettering.** A message that exhausts its delivery budget is moved
//!   to an inspectable dead-letter buffer instead of being redelivered forever.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use pipeline::types::WorkflowChangeEvent;
use pipeline::{DispatchError, EventDispatch};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for queue delivery behaviour.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a delivered message stays invisible before it is considered
    /// abandoned and requeued.
    pub visibility_timeout: Duration,
    /// Total deliveries a message may receive before it is dead-lettered.
    pub max_deliveries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_deliveries: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery types
// ---------------------------------------------------------------------------

/// A message handed to a consumer, paired with the receipt needed to settle it.
#[derive(Debug)]
pub struct Delivery {
    pub event: WorkflowChangeEvent,
    pub receipt: Receipt,
}

/// Opaque settlement handle for a single delivery.
///
/// Settling with a stale receipt (after the lease already expired and the
/// message was requeued) is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    group: String,
    message_id: u64,
    /// Delivery attempt the receipt belongs to. A receipt from a lapsed
    /// lease no longer matches once the message is redelivered.
    attempt: u32,
}

/// A message that exhausted its delivery budget.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub event: WorkflowChangeEvent,
    pub delivery_count: u32,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct QueuedMessage {
    id: u64,
    event: WorkflowChangeEvent,
    /// Number of times this message has been handed to a consumer.
    delivery_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: QueuedMessage,
    lease_expires_at: Instant,
}

#[derive(Debug, Default)]
struct GroupState {
    pending: VecDeque<QueuedMessage>,
    in_flight: Option<InFlight>,
}

impl GroupState {
    fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_none()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    groups: HashMap<String, GroupState>,
    /// Dedup keys of every message accepted so far.
    accepted_keys: HashSet<String>,
    dead_letters: Vec<DeadLetter>,
    next_message_id: u64,
    closed: bool,
}

// ---------------------------------------------------------------------------
// InMemoryQueue
// ---------------------------------------------------------------------------

/// In-process queue with per-group ordering, visibility leases, publish-side
/// dedup-key suppression, and a dead-letter buffer.
#[derive(Debug)]
pub struct InMemoryQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    wakeup: Notify,
}

impl InMemoryQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            wakeup: Notify::new(),
        }
    }

    /// Receive the next deliverable message.
    ///
    /// Blocks until a message is available, a lease expires, or the queue is
    /// closed and fully drained. Returns `None` only in the latter case.
    pub async fn receive(&self) -> Option<Delivery> {
        loop {
            let next_deadline = {
                let mut state = self.lock_state();
                self.reap_expired_leases(&mut state);

                if let Some(delivery) = self.take_deliverable(&mut state) {
                    return Some(delivery);
                }
                if state.closed && state.groups.values().all(GroupState::is_empty) {
                    return None;
                }
                self.earliest_lease_expiry(&state)
            };

            match next_deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = self.wakeup.notified() => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => self.wakeup.notified().await,
            }
        }
    }

    /// Settle a delivery as successfully processed.
    pub fn ack(&self, receipt: &Receipt) {
        let mut state = self.lock_state();
        let Some(group) = state.groups.get_mut(&receipt.group) else {
            return;
        };
        let matches = group.in_flight.as_ref().is_some_and(|f| {
            f.message.id == receipt.message_id && f.message.delivery_count == receipt.attempt
        });
        if !matches {
            tracing::debug!(group = %receipt.group, "ignoring stale ack");
            return;
        }
        group.in_flight = None;
        if group.is_empty() {
            state.groups.remove(&receipt.group);
        }
        // The group's next message (if any) is now deliverable.
        self.wakeup.notify_one();
    }

    /// Return a delivery for redelivery, or dead-letter it if the budget is
    /// spent.
    pub fn nack(&self, receipt: &Receipt) {
        let mut state = self.lock_state();
        let Some(group) = state.groups.get_mut(&receipt.group) else {
            return;
        };
        let matches = group.in_flight.as_ref().is_some_and(|f| {
            f.message.id == receipt.message_id && f.message.delivery_count == receipt.attempt
        });
        if !matches {
            tracing::debug!(group = %receipt.group, "ignoring stale nack");
            return;
        }
        if let Some(in_flight) = group.in_flight.take() {
            self.requeue_or_bury(&mut state, &receipt.group, in_flight.message);
        }
        self.wakeup.notify_one();
    }

    /// Stop accepting publishes. Consumers drain what is already queued and
    /// then observe end-of-stream.
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.closed = true;
        drop(state);
        self.wakeup.notify_waiters();
        // A consumer that was about to park may still miss notify_waiters;
        // leave a stored permit so its next wait returns immediately.
        self.wakeup.notify_one();
    }

    /// Snapshot of the dead-letter buffer.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock_state().dead_letters.clone()
    }

    /// Number of messages currently queued or in flight.
    pub fn depth(&self) -> usize {
        let state = self.lock_state();
        state
            .groups
            .values()
            .map(|g| g.pending.len() + usize::from(g.in_flight.is_some()))
            .sum()
    }

    // -- internals ----------------------------------------------------------

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        // Lock poisoning only occurs if a holder panicked; the state itself
        // stays consistent because every mutation completes under the guard.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Move expired in-flight messages back to the head of their group, or to
    /// the dead-letter buffer when the delivery budget is exhausted.
    fn reap_expired_leases(&self, state: &mut QueueState) {
        let now = Instant::now();
        let expired: Vec<String> = state
            .groups
            .iter()
            .filter(|(_, g)| {
                g.in_flight
                    .as_ref()
                    .is_some_and(|f| f.lease_expires_at <= now)
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            let Some(group) = state.groups.get_mut(&key) else {
                continue;
            };
            if let Some(in_flight) = group.in_flight.take() {
                tracing::warn!(
                    group = %key,
                    delivery_count = in_flight.message.delivery_count,
                    "visibility lease expired, requeueing"
                );
                self.requeue_or_bury(state, &key, in_flight.message);
            }
        }
    }

    fn requeue_or_bury(&self, state: &mut QueueState, group_key: &str, message: QueuedMessage) {
        if message.delivery_count >= self.config.max_deliveries {
            tracing::error!(
                group = %group_key,
                delivery_count = message.delivery_count,
                "delivery budget exhausted, dead-lettering"
            );
            state.dead_letters.push(DeadLetter {
                event: message.event,
                delivery_count: message.delivery_count,
            });
            if state.groups.get(group_key).is_some_and(GroupState::is_empty) {
                state.groups.remove(group_key);
            }
            return;
        }
        if let Some(group) = state.groups.get_mut(group_key) {
            // Redeliveries go to the head so group order is preserved.
            group.pending.push_front(message);
        }
    }

    /// Pick any group with no in-flight message and a pending head, lease its
    /// head, and hand it out.
    fn take_deliverable(&self, state: &mut QueueState) -> Option<Delivery> {
        let group_key = state
            .groups
            .iter()
            .find(|(_, g)| g.in_flight.is_none() && !g.pending.is_empty())
            .map(|(key, _)| key.clone())?;

        let group = state.groups.get_mut(&group_key)?;
        let mut message = group.pending.pop_front()?;
        message.delivery_count += 1;

        let receipt = Receipt {
            group: group_key,
            message_id: message.id,
            attempt: message.delivery_count,
        };
        let event = message.event.clone();
        group.in_flight = Some(InFlight {
            message,
            lease_expires_at: Instant::now() + self.config.visibility_timeout,
        });
        Some(Delivery { event, receipt })
    }

    fn earliest_lease_expiry(&self, state: &QueueState) -> Option<Instant> {
        state
            .groups
            .values()
            .filter_map(|g| g.in_flight.as_ref().map(|f| f.lease_expires_at))
            .min()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

#[async_trait]
impl EventDispatch for InMemoryQueue {
    async fn publish(&self, event: &WorkflowChangeEvent) -> Result<(), DispatchError> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(DispatchError::Closed);
        }

        let dedup_key = event.dedup_key();
        if !state.accepted_keys.insert(dedup_key.clone()) {
            tracing::debug!(dedup_key = %dedup_key, "suppressing duplicate publish");
            return Ok(());
        }

        let group_key = event.group_key();
        let id = state.next_message_id;
        state.next_message_id += 1;
        state
            .groups
            .entry(group_key.as_str().to_owned())
            .or_default()
            .pending
            .push_back(QueuedMessage {
                id,
                event: event.clone(),
                delivery_count: 0,
            });
        drop(state);
        self.wakeup.notify_one();
        Ok(())
    }
}
