// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Relay state shared by every connection task.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Frames a slow client may fall behind by before it starts losing them.
const BROADCAST_CAPACITY: usize = 1024;

/// Identifies one connected client for the lifetime of the relay.
pub type ClientId = u64;

/// A text frame on its way to the other clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub from: ClientId,
    pub text: String,
}

#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    echo: bool,
    broadcast_tx: broadcast::Sender<Frame>,
    next_client: AtomicU64,
    connected: AtomicUsize,
}

impl RelayState {
    pub fn new(echo: bool) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        RelayState {
            inner: Arc::new(RelayStateInner {
                echo,
                broadcast_tx,
                next_client: AtomicU64::new(1),
                connected: AtomicUsize::new(0),
            }),
        }
    }

    /// Whether frames go back to their sender too.
    pub fn echo(&self) -> bool {
        self.inner.echo
    }

    /// Registers a new client. Pair with [`RelayState::leave`].
    pub fn join(&self) -> (ClientId, broadcast::Receiver<Frame>) {
        let id = self.inner.next_client.fetch_add(1, Ordering::Relaxed);
        self.inner.connected.fetch_add(1, Ordering::Relaxed);
        (id, self.inner.broadcast_tx.subscribe())
    }

    pub fn leave(&self) {
        self.inner.connected.fetch_sub(1, Ordering::Relaxed);
    }

    /// Fans a frame out. Returns how many receivers were live.
    pub fn publish(&self, from: ClientId, text: String) -> usize {
        self.inner
            .broadcast_tx
            .send(Frame { from, text })
            .unwrap_or(0)
    }

    pub fn connected(&self) -> usize {
        self.inner.connected.load(Ordering::Relaxed)
    }
}
