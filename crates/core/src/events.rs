// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection states and the events published to observers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DropStrategy;
use crate::error::{Error, Result};

/// Identifier of a queued outbound item. Monotonic per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Offline,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Offline => "offline",
            ConnectionState::Failed => "failed",
        }
    }

    /// True while a connection exists or is being established.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(ConnectionState::Idle),
            "connecting" => Ok(ConnectionState::Connecting),
            "connected" => Ok(ConnectionState::Connected),
            "reconnecting" => Ok(ConnectionState::Reconnecting),
            "disconnected" => Ok(ConnectionState::Disconnected),
            "offline" => Ok(ConnectionState::Offline),
            "failed" => Ok(ConnectionState::Failed),
            other => Err(Error::InvalidState(other.to_string())),
        }
    }
}

/// A recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: ConnectionState,
    pub previous: ConnectionState,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    pub at: DateTime<Utc>,
}

/// Category of an error published on the error stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport refused or dropped the connection.
    Connect,
    /// Credentials rejected; no automatic reconnect.
    Auth,
    /// Connect attempt did not resolve in time.
    Timeout,
    /// Transport reported an error on an established connection.
    Transport,
    /// A direct send failed; the item was queued instead.
    Send,
    /// The queue refused an item under the `error` drop strategy.
    QueueFull,
    /// Bounded reconnection gave up.
    ReconnectExhausted,
}

/// An error published on the error stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorEvent {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Why an item left the queue without being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The queue is disabled.
    Disabled,
    /// Evicted to make room for a newer item.
    Evicted,
    /// Refused because the queue was full.
    Refused,
    /// Removed by an explicit clear.
    Cleared,
}

/// Events emitted by the outbound queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    QueueFull {
        id: ItemId,
        size: usize,
        strategy: DropStrategy,
    },
    Dropped {
        id: ItemId,
        reason: DropReason,
    },
    Expired {
        id: ItemId,
        age_ms: u64,
    },
    RetryScheduled {
        id: ItemId,
        attempt: u32,
        delay_ms: u64,
    },
    RetryGiveup {
        id: ItemId,
        attempt: u32,
        error: String,
    },
    GiveupStored {
        id: ItemId,
        stored: usize,
    },
}

impl QueueEvent {
    /// The item the event refers to.
    pub fn id(&self) -> ItemId {
        match self {
            QueueEvent::QueueFull { id, .. }
            | QueueEvent::Dropped { id, .. }
            | QueueEvent::Expired { id, .. }
            | QueueEvent::RetryScheduled { id, .. }
            | QueueEvent::RetryGiveup { id, .. }
            | QueueEvent::GiveupStored { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueueEvent::QueueFull { .. } => "queue_full",
            QueueEvent::Dropped { .. } => "dropped",
            QueueEvent::Expired { .. } => "expired",
            QueueEvent::RetryScheduled { .. } => "retry_scheduled",
            QueueEvent::RetryGiveup { .. } => "retry_giveup",
            QueueEvent::GiveupStored { .. } => "giveup_stored",
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
