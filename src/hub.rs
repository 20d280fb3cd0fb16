// EnergyDash - Measurement ingestion and alert fan-out
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Broadcast hub for live notification subscribers
//!
//! The [`BroadcastHub`] keeps the set of connected subscribers keyed by a
//! generated [`SubscriberId`]. Each subscriber owns the receiving half of a
//! bounded channel; the connection task drains it and forwards messages to
//! its client.
//!
//! [`BroadcastHub::publish`] snapshots the senders under the lock, sends
//! outside of it, then removes every subscriber whose receiver is gone or
//! whose queue is full. A failed send never affects delivery to the others.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use uuid::Uuid;

/// Opaque handle identifying one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving side handed to a new subscriber
#[derive(Debug)]
pub struct Subscription {
    /// Handle to pass back to [`BroadcastHub::unsubscribe`]
    pub id: SubscriberId,
    /// Published messages, in publish order
    pub receiver: Receiver<String>,
}

impl Subscription {
    /// Wait for the next message. `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Outcome of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that accepted the message
    pub delivered: usize,
    /// Subscribers removed because their send failed
    pub dropped: usize,
}

/// Messages a subscriber may have pending before it is dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Concurrency-safe set of live subscribers
#[derive(Debug)]
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, Sender<String>>>,
    capacity: usize,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl BroadcastHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty hub whose subscribers queue at most `capacity` messages
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so
    // a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Sender<String>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = SubscriberId::generate();
        let active = {
            let mut subscribers = self.lock();
            subscribers.insert(id, sender);
            subscribers.len()
        };
        info!("Subscriber {} connected ({} active)", id, active);
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!("Subscriber {} disconnected", id);
        }
        removed
    }

    /// Deliver `message` to every active subscriber
    pub fn publish(&self, message: impl Into<String>) -> PublishReport {
        let message = message.into();
        let snapshot: Vec<(SubscriberId, Sender<String>)> = self
            .lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut report = PublishReport::default();
        let mut failed = Vec::new();
        for (id, sender) in snapshot {
            match sender.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Subscriber {} is not keeping up, dropping it", id);
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => failed.push(id),
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.lock();
            for id in failed {
                if subscribers.remove(&id).is_some() {
                    report.dropped += 1;
                    debug!("Dropped subscriber {} after failed send", id);
                }
            }
        }

        report
    }

    /// Number of active subscribers
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no subscriber is connected
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_unsubscribe() {
        let hub = BroadcastHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        assert_ne!(a.id, b.id);
        assert_eq!(hub.len(), 2);

        assert!(hub.unsubscribe(a.id));
        assert!(!hub.unsubscribe(a.id));
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_publish_empty_hub() {
        let hub = BroadcastHub::new();
        assert!(hub.is_empty());
        assert_eq!(hub.publish("hello"), PublishReport::default());
    }

    #[test]
    fn test_publish_order() {
        let hub = BroadcastHub::new();
        let mut sub = hub.subscribe();
        hub.publish("one");
        hub.publish("two");
        assert_eq!(sub.receiver.try_recv().unwrap(), "one");
        assert_eq!(sub.receiver.try_recv().unwrap(), "two");
    }

    #[test]
    fn test_full_queue_is_dropped() {
        let hub = BroadcastHub::with_capacity(2);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        for i in 0..2 {
            let report = hub.publish(format!("m{i}"));
            assert_eq!(report.delivered, 2);
            assert_eq!(fast.receiver.try_recv().unwrap(), format!("m{i}"));
        }

        let report = hub.publish("m2");
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert_eq!(hub.len(), 1);
        assert!(!hub.unsubscribe(slow.id));
        assert_eq!(fast.receiver.try_recv().unwrap(), "m2");

        // Queued messages are still readable, then the channel reports closed.
        assert_eq!(slow.receiver.try_recv().unwrap(), "m0");
        assert_eq!(slow.receiver.try_recv().unwrap(), "m1");
        assert!(slow.receiver.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_dropped() {
        let hub = BroadcastHub::new();
        let mut kept = hub.subscribe();
        let mut closed = hub.subscribe();
        closed.receiver.close();

        let report = hub.publish("alert");
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert_eq!(hub.len(), 1);
        assert_eq!(kept.receiver.try_recv().unwrap(), "alert");
        assert!(!hub.unsubscribe(closed.id));
    }
}
