// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios for the tether connection manager.
//!
//! Everything here drives the public API only. [`ScriptedTransport`] stands
//! in for the network: tests decide how each connect and send turns out and
//! inspect what reached the wire.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use tether::connection::{
    ConnectionManager, EventSink, ManagerBuilder, Transport, TransportError, TransportEvent,
    TransportResult, TransportStatus,
};
use tether_core::{Credentials, Envelope, HealthMetrics, ManagerConfig};

/// How one connect call ends.
#[derive(Debug, Clone)]
pub enum Connect {
    Ok,
    After(Duration),
    Refused,
    Rejected,
}

#[derive(Default)]
struct Wire {
    connects: VecDeque<Connect>,
    connect_calls: usize,
    connect_times: Vec<tokio::time::Instant>,
    connected: bool,
    failing_sends: usize,
    always_fail: bool,
    sent: Vec<String>,
    events: Option<EventSink>,
}

/// Transport whose behaviour is scripted by the test. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    wire: Arc<Mutex<Wire>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues connect outcomes; unscripted connects succeed.
    pub fn on_connect(&self, outcomes: impl IntoIterator<Item = Connect>) {
        self.wire.lock().unwrap().connects.extend(outcomes);
    }

    /// Fails the next `count` sends.
    pub fn fail_next_sends(&self, count: usize) {
        self.wire.lock().unwrap().failing_sends = count;
    }

    pub fn fail_every_send(&self, fail: bool) {
        self.wire.lock().unwrap().always_fail = fail;
    }

    pub fn connect_calls(&self) -> usize {
        self.wire.lock().unwrap().connect_calls
    }

    /// Gaps between consecutive connect calls.
    pub fn connect_gaps(&self) -> Vec<Duration> {
        let times = self.wire.lock().unwrap().connect_times.clone();
        times.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }

    /// Wire text of every envelope that was accepted, in order.
    pub fn sent(&self) -> Vec<String> {
        self.wire.lock().unwrap().sent.clone()
    }

    /// The server goes away.
    pub fn drop_link(&self) {
        let mut wire = self.wire.lock().unwrap();
        wire.connected = false;
        if let Some(events) = wire.events.take() {
            let _ = events.send(TransportEvent::status(
                TransportStatus::Disconnected,
                Some("link dropped".into()),
            ));
        }
    }
}

impl Transport for ScriptedTransport {
    fn connect(
        &mut self,
        _credentials: &Credentials,
        events: EventSink,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let wire = Arc::clone(&self.wire);
        Box::pin(async move {
            let outcome = {
                let mut wire = wire.lock().unwrap();
                wire.connect_calls += 1;
                wire.connect_times.push(tokio::time::Instant::now());
                wire.connects.pop_front().unwrap_or(Connect::Ok)
            };
            match outcome {
                Connect::Ok => {}
                Connect::After(delay) => tokio::time::sleep(delay).await,
                Connect::Refused => {
                    return Err(TransportError::ConnectionFailed("refused".into()));
                }
                Connect::Rejected => {
                    return Err(TransportError::AuthFailed("rejected".into()));
                }
            }
            let _ = events.send(TransportEvent::status(TransportStatus::Connected, None));
            let mut wire = wire.lock().unwrap();
            wire.connected = true;
            wire.events = Some(events);
            Ok(())
        })
    }

    fn disconnect(
        &mut self,
        _reason: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let wire = Arc::clone(&self.wire);
        Box::pin(async move {
            let mut wire = wire.lock().unwrap();
            wire.connected = false;
            wire.events = None;
            Ok(())
        })
    }

    fn send(&mut self, envelope: &Envelope) -> TransportResult<()> {
        let mut wire = self.wire.lock().unwrap();
        if !wire.connected {
            return Err(TransportError::ConnectionClosed);
        }
        if wire.always_fail {
            return Err(TransportError::SendFailed("scripted failure".into()));
        }
        if wire.failing_sends > 0 {
            wire.failing_sends -= 1;
            return Err(TransportError::SendFailed("scripted failure".into()));
        }
        let text = envelope
            .to_wire()
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        wire.sent.push(text);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wire.lock().unwrap().connected
    }
}

/// Deterministic config: fixed seed, no jitter.
pub fn config() -> ManagerConfig {
    let mut config = ManagerConfig::default();
    config.jitter_seed = Some(42);
    config.reconnect.jitter_ratio = 0.0;
    config.queue.retry_backoff_jitter_ratio = 0.0;
    config
}

pub fn manager(transport: &ScriptedTransport, config: ManagerConfig) -> ConnectionManager {
    ManagerBuilder::new(transport.clone(), Credentials::new("ws://scripted"))
        .config(config)
        .build()
        .unwrap()
}

/// Everything already buffered on a stream.
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

/// Metrics after every earlier command has been applied.
pub async fn settle(manager: &ConnectionManager) -> HealthMetrics {
    manager.metrics().await.unwrap()
}

fn outcomes(metrics: &HealthMetrics) -> [u64; 5] {
    [
        metrics.outbound_queued,
        metrics.outbound_sent,
        metrics.outbound_dropped,
        metrics.outbound_expired,
        metrics.outbound_giveups,
    ]
}

/// `(queued, sent + dropped + expired + given up + pending)` from one
/// consistent view of the manager.
pub async fn ledger(manager: &ConnectionManager) -> (u64, u64) {
    loop {
        let before = outcomes(&settle(manager).await);
        let pending = manager.outbound_queue_snapshot().await.unwrap().len() as u64;
        let after = outcomes(&settle(manager).await);
        // A timer may have fired between the requests; look again.
        if before == after {
            let [queued, sent, dropped, expired, giveups] = after;
            return (queued, sent + dropped + expired + giveups + pending);
        }
    }
}
