// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Public handle to a connection manager.
//!
//! A [`ConnectionManager`] is cheap to clone; every clone talks to the same
//! background task. Build one with [`ManagerBuilder`] from inside a tokio
//! runtime:
//!
//! ```no_run
//! # async fn demo() -> tether::Result<()> {
//! use tether::connection::{ManagerBuilder, SendOptions, WebSocketTransport};
//! use tether_core::Credentials;
//!
//! let manager = ManagerBuilder::new(
//!     WebSocketTransport::new(),
//!     Credentials::new("ws://127.0.0.1:7890"),
//! )
//! .build()?;
//!
//! manager.connect().await?;
//! manager.send_raw("<presence/>", SendOptions::default())?;
//! manager.dispose().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use tether_core::{
    ConnectionState, Credentials, EnqueueOptions, Envelope, ErrorEvent, HealthMetrics,
    ItemSnapshot, ManagerConfig, QueueEvent, ResetOptions, RetryBackoffFn, StateChange,
};

use super::actor::{Actor, Command, Control, Reply, Wiring};
use super::bus::{Broadcast, NoopBus};
use super::streams::Streams;
use super::transport::Transport;
use crate::error::{Error, Result};

/// Per-message options for `send_*`.
pub type SendOptions = EnqueueOptions;

/// Assembles a [`ConnectionManager`] from its collaborators.
pub struct ManagerBuilder {
    transport: Box<dyn Transport>,
    credentials: Credentials,
    config: ManagerConfig,
    bus: Arc<dyn Broadcast>,
    retry_backoff: Option<RetryBackoffFn>,
}

impl ManagerBuilder {
    pub fn new(transport: impl Transport + 'static, credentials: Credentials) -> Self {
        ManagerBuilder {
            transport: Box::new(transport),
            credentials,
            config: ManagerConfig::default(),
            bus: Arc::new(NoopBus),
            retry_backoff: None,
        }
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bus on which state changes are published. Defaults to [`NoopBus`].
    pub fn bus(mut self, bus: Arc<dyn Broadcast>) -> Self {
        self.bus = bus;
        self
    }

    /// Custom per-item retry delay, in milliseconds for a 1-based attempt.
    pub fn retry_backoff(mut self, retry_backoff: RetryBackoffFn) -> Self {
        self.retry_backoff = Some(retry_backoff);
        self
    }

    /// Validates the configuration and spawns the manager task.
    pub fn build(self) -> Result<ConnectionManager> {
        self.config.validate()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| Error::NoRuntime(e.to_string()))?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let streams = Arc::new(Streams::default());

        let actor = Actor::new(Wiring {
            transport: self.transport,
            credentials: self.credentials,
            config: self.config,
            bus: self.bus,
            retry_backoff: self.retry_backoff,
            streams: Arc::clone(&streams),
            state_tx,
            commands: commands_rx,
        });
        runtime.spawn(actor.run());

        Ok(ConnectionManager {
            commands: commands_tx,
            state: state_rx,
            streams,
        })
    }
}

/// Handle to a running connection manager.
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    streams: Arc<Streams>,
}

impl ConnectionManager {
    fn command(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::Disposed)
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.command(make(tx))?;
        rx.await.map_err(|_| Error::Disposed)
    }

    /// Connects, or joins the attempt already in flight.
    ///
    /// Resolves to the state the attempt settled in: `Connected`, `Failed`
    /// (a reconnect may already be scheduled), `Offline` or `Disconnected`.
    /// Fails only for transport initiation errors and after disposal.
    pub async fn connect(&self) -> Result<ConnectionState> {
        self.request(|reply| Command::Control(Control::Connect(reply)))
            .await?
    }

    /// Closes the connection. With `reconnect` a new attempt starts at once.
    pub async fn disconnect(&self, reconnect: bool) -> Result<()> {
        self.request(|reply| Command::Control(Control::Disconnect { reconnect, reply }))
            .await
    }

    /// Sends a pre-serialized stanza, queueing it if it cannot go out now.
    pub fn send_raw(&self, payload: impl Into<String>, options: SendOptions) -> Result<()> {
        self.send(Envelope::raw(payload), options)
    }

    /// Sends a structured stanza, queueing it if it cannot go out now.
    pub fn send_element(&self, element: serde_json::Value, options: SendOptions) -> Result<()> {
        self.send(Envelope::element(element), options)
    }

    pub fn send(&self, envelope: Envelope, options: SendOptions) -> Result<()> {
        self.command(Command::Send { envelope, options })
    }

    /// Reports a network reachability change from the host.
    pub fn set_network_status(&self, online: bool) -> Result<()> {
        self.command(Command::Control(Control::Network(online)))
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Waits until the manager reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<ConnectionState> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|current| *current == target)
            .await
            .map_err(|_| Error::Disposed)?;
        Ok(*reached)
    }

    /// Latest-value view of the connection state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub async fn metrics(&self) -> Result<HealthMetrics> {
        self.request(Command::Metrics).await
    }

    pub async fn reset_metrics(&self, options: ResetOptions) -> Result<()> {
        self.request(|reply| Command::ResetMetrics { options, reply })
            .await
    }

    pub async fn outbound_queue_snapshot(&self) -> Result<Vec<ItemSnapshot>> {
        self.request(Command::QueueSnapshot).await
    }

    pub async fn giveup_queue_snapshot(&self) -> Result<Vec<ItemSnapshot>> {
        self.request(Command::GiveupSnapshot).await
    }

    /// Drops every pending item. Returns how many were dropped.
    pub async fn clear_outbound_queue(&self) -> Result<usize> {
        self.request(Command::ClearQueue).await
    }

    pub async fn clear_giveup_queue(&self) -> Result<usize> {
        self.request(Command::ClearGiveups).await
    }

    pub fn subscribe_state(&self) -> mpsc::UnboundedReceiver<StateChange> {
        self.streams.state.subscribe()
    }

    pub fn subscribe_errors(&self) -> mpsc::UnboundedReceiver<ErrorEvent> {
        self.streams.errors.subscribe()
    }

    pub fn subscribe_inbound(&self) -> mpsc::UnboundedReceiver<Envelope> {
        self.streams.inbound.subscribe()
    }

    pub fn subscribe_outbound(&self) -> mpsc::UnboundedReceiver<Envelope> {
        self.streams.outbound.subscribe()
    }

    pub fn subscribe_metrics(&self) -> mpsc::UnboundedReceiver<HealthMetrics> {
        self.streams.metrics.subscribe()
    }

    pub fn subscribe_queue_events(&self) -> mpsc::UnboundedReceiver<QueueEvent> {
        self.streams.queue.subscribe()
    }

    /// Stops the manager, closes the transport and ends every stream.
    /// Calling it again is a no-op.
    pub async fn dispose(&self) {
        let _ = self
            .request(|reply| Command::Control(Control::Dispose(reply)))
            .await;
    }

    pub fn is_disposed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
