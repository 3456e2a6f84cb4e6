// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Topic-based notification bus for sharing connection events with other
//! parts of the host application.
//!
//! The manager publishes every state change on [`STATE_TOPIC`]. Hosts that
//! coordinate several processes can implement [`Broadcast`] over their own
//! pub/sub; [`LocalBus`] covers the in-process case and [`NoopBus`] turns it off.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

/// Topic carrying serialized [`StateChange`](tether_core::StateChange)s.
pub const STATE_TOPIC: &str = "connection.state";

/// Topic pattern that matches every topic.
pub const ALL_TOPICS: &str = "*";

/// Handle returned by [`Broadcast::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked with the topic and message.
pub type BusHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Publish/subscribe notification interface.
pub trait Broadcast: Send + Sync {
    fn publish(&self, topic: &str, message: Value);

    /// Registers `handler` for `topic`, or for every topic with [`ALL_TOPICS`].
    fn subscribe(&self, topic: &str, handler: BusHandler) -> SubscriptionId;

    /// Returns false if the subscription did not exist.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// In-process bus with synchronous dispatch.
#[derive(Default)]
pub struct LocalBus {
    inner: Mutex<LocalBusInner>,
}

#[derive(Default)]
struct LocalBusInner {
    next_id: u64,
    handlers: Vec<(SubscriptionId, String, BusHandler)>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LocalBusInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().handlers.len()
    }
}

impl Broadcast for LocalBus {
    fn publish(&self, topic: &str, message: Value) {
        // Handlers run without the lock held so they may (un)subscribe.
        let matching: Vec<BusHandler> = self
            .lock()
            .handlers
            .iter()
            .filter(|(_, pattern, _)| pattern == topic || pattern == ALL_TOPICS)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect();

        for handler in matching {
            handler(topic, &message);
        }
    }

    fn subscribe(&self, topic: &str, handler: BusHandler) -> SubscriptionId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.handlers.push((id, topic.to_string(), handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.handlers.len();
        inner.handlers.retain(|(existing, _, _)| *existing != id);
        inner.handlers.len() != before
    }
}

/// Bus that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBus;

impl Broadcast for NoopBus {
    fn publish(&self, _topic: &str, _message: Value) {}

    fn subscribe(&self, _topic: &str, _handler: BusHandler) -> SubscriptionId {
        SubscriptionId(0)
    }

    fn unsubscribe(&self, _id: SubscriptionId) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
