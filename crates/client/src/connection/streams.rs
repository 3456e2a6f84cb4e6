// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-subscriber event streams.
//!
//! Each subscriber gets its own unbounded channel, so a slow reader never
//! causes another to miss events and every reader sees events in publish
//! order. Closing a fanout ends every subscriber's stream.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use tether_core::{Envelope, ErrorEvent, HealthMetrics, QueueEvent, StateChange};

/// Observer list of channel senders.
#[derive(Debug)]
pub struct Fanout<T> {
    inner: Mutex<FanoutInner<T>>,
}

#[derive(Debug)]
struct FanoutInner<T> {
    subscribers: Vec<mpsc::UnboundedSender<T>>,
    closed: bool,
}

impl<T: Clone> Fanout<T> {
    pub fn new() -> Self {
        Fanout {
            inner: Mutex::new(FanoutInner {
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FanoutInner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a subscriber. After [`close`](Self::close) the stream ends immediately.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Delivers `value` to every live subscriber. Returns how many received it.
    pub fn publish(&self, value: T) -> usize {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
        inner.subscribers.len()
    }

    pub fn has_subscribers(&self) -> bool {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        !inner.subscribers.is_empty()
    }

    /// Ends every subscriber's stream and refuses new subscribers.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl<T: Clone> Default for Fanout<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Every stream a connection manager exposes.
#[derive(Debug, Default)]
pub(crate) struct Streams {
    pub state: Fanout<StateChange>,
    pub errors: Fanout<ErrorEvent>,
    pub inbound: Fanout<Envelope>,
    pub outbound: Fanout<Envelope>,
    pub metrics: Fanout<HealthMetrics>,
    pub queue: Fanout<QueueEvent>,
}

impl Streams {
    pub fn close_all(&self) {
        self.state.close();
        self.errors.close();
        self.inbound.close();
        self.outbound.close();
        self.metrics.close();
        self.queue.close();
    }
}

#[cfg(test)]
#[path = "streams_tests.rs"]
mod tests;
