// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction consumed by the connection manager.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production ([`WebSocketTransport`](super::WebSocketTransport))
//! - Mock transports for unit testing
//!
//! A transport reports asynchronous changes through the [`EventSink`] handed
//! to [`Transport::connect`]. Each connect call gets a fresh sink, so events
//! from an abandoned connection never reach the manager.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use tether_core::{Credentials, Envelope};

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The connect call could not be started at all (bad URL, unsupported
    /// scheme). Never retried automatically.
    #[error("could not initiate connection: {0}")]
    Initiation(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Connection status reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportStatus {
    Connecting,
    Connected,
    Disconnected,
    AuthFailure,
    ConnectionFailure,
    Error,
}

impl TransportStatus {
    /// True for statuses that end an established connection.
    pub fn is_loss(&self) -> bool {
        matches!(
            self,
            TransportStatus::Disconnected
                | TransportStatus::AuthFailure
                | TransportStatus::ConnectionFailure
                | TransportStatus::Error
        )
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportStatus::Connecting => "connecting",
            TransportStatus::Connected => "connected",
            TransportStatus::Disconnected => "disconnected",
            TransportStatus::AuthFailure => "auth-failure",
            TransportStatus::ConnectionFailure => "connection-failure",
            TransportStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Something a transport reports outside of a direct call.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Status change, with an error description where relevant.
    Status {
        status: TransportStatus,
        error: Option<String>,
    },
    /// An envelope received from the server.
    Inbound(Envelope),
    /// A measured heartbeat round trip.
    RoundTrip(Duration),
}

impl TransportEvent {
    pub fn status(status: TransportStatus, error: Option<String>) -> Self {
        TransportEvent::Status { status, error }
    }
}

/// Channel on which a transport reports [`TransportEvent`]s.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Transport trait for stanza-oriented socket connections.
///
/// `connect` and `disconnect` are asynchronous; `send` is a synchronous
/// hand-off that fails immediately when the envelope cannot be accepted.
pub trait Transport: Send + Sync {
    /// Connect to the server described by `credentials`.
    ///
    /// Resolves once the connection is usable or has failed. Later status
    /// changes and inbound envelopes are reported on `events`.
    fn connect(
        &mut self,
        credentials: &Credentials,
        events: EventSink,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Close the connection. Safe to call when not connected.
    fn disconnect(
        &mut self,
        reason: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Hand an envelope to the connection.
    fn send(&mut self, envelope: &Envelope) -> TransportResult<()>;

    /// Check if connected.
    fn is_connected(&self) -> bool;
}
