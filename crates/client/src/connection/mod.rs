// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Resilient connection management.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐  commands   ┌─────────────┐     ┌─────────────┐
//! │ ConnectionManager │────────────►│    Actor    │────►│  Transport  │
//! │     (handle)      │◄────────────│ (one task)  │◄────│   (trait)   │
//! └───────────────────┘   replies   └─────────────┘     └─────────────┘
//!           ▲                         │    │
//!           │ streams                 ▼    ▼
//!           │                  ┌─────────┐ ┌─────────┐
//!           └──────────────────│  Queue  │ │ Metrics │
//!                              └─────────┘ └─────────┘
//! ```
//!
//! # Features
//!
//! - Automatic reconnect with exponential backoff and jitter
//! - Outbound queue with priorities, TTL expiry and per-item retries
//! - State, error, inbound, outbound, metrics and queue-event streams
//! - Network online/offline signals from the host
//! - Injectable transport and broadcast bus for testing

mod actor;
mod bus;
mod manager;
mod streams;
mod transport;
mod websocket;

pub use bus::{Broadcast, BusHandler, LocalBus, NoopBus, SubscriptionId, ALL_TOPICS, STATE_TOPIC};
pub use manager::{ConnectionManager, ManagerBuilder, SendOptions};
pub use streams::Fanout;
pub use transport::{
    EventSink, Transport, TransportError, TransportEvent, TransportResult, TransportStatus,
};
pub use websocket::WebSocketTransport;
