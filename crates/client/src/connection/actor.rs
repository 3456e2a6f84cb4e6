// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The task that owns the transport, queue, metrics and timers.
//!
//! All mutation happens here. [`ConnectionManager`](super::ConnectionManager)
//! handles forward [`Command`]s over an unbounded channel, so commands are
//! applied in call order, and get answers back over oneshot channels.
//!
//! Timers are plain deadlines polled by the `select!` loop in [`Actor::run`];
//! cancelling one means setting it to `None`. At most one connect attempt is
//! in flight: while it runs, [`Actor::attempt`] keeps serving commands that do
//! not affect the connection and turns the rest into joins or aborts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tether_core::queue::MIN_FLUSH_YIELD;
use tether_core::{
    Backoff, ConnectionState, Counter, Credentials, EnqueueOptions, EnqueueOutcome, Envelope,
    ErrorEvent, ErrorKind, HealthMetrics, ItemSnapshot, ManagerConfig, MetricsSink,
    OutboundQueue, ResetOptions, RetryBackoffFn, StateChange,
};

use super::bus::{Broadcast, STATE_TOPIC};
use super::streams::Streams;
use super::transport::{Transport, TransportError, TransportEvent, TransportStatus};
use crate::error::{Error, Result};

pub(crate) type Reply<T> = oneshot::Sender<T>;

/// Requests sent from a manager handle to its actor.
pub(crate) enum Command {
    Control(Control),
    Send {
        envelope: Envelope,
        options: EnqueueOptions,
    },
    Metrics(Reply<HealthMetrics>),
    ResetMetrics {
        options: ResetOptions,
        reply: Reply<()>,
    },
    QueueSnapshot(Reply<Vec<ItemSnapshot>>),
    GiveupSnapshot(Reply<Vec<ItemSnapshot>>),
    ClearQueue(Reply<usize>),
    ClearGiveups(Reply<usize>),
}

/// Commands that change the connection itself.
pub(crate) enum Control {
    Connect(Reply<Result<ConnectionState>>),
    Disconnect { reconnect: bool, reply: Reply<()> },
    Network(bool),
    Dispose(Reply<()>),
}

/// Why an in-flight connect attempt was abandoned.
enum Abort {
    Disconnect { reconnect: bool, reply: Reply<()> },
    Offline,
    Dispose(Option<Reply<()>>),
}

enum Attempt {
    Finished(std::result::Result<(), TransportError>),
    TimedOut(Duration),
    Aborted(Abort),
}

/// A failed connect attempt.
enum Failure {
    Transport(TransportError),
    Timeout(Duration),
}

impl Failure {
    fn kind(&self) -> ErrorKind {
        match self {
            Failure::Timeout(_) => ErrorKind::Timeout,
            Failure::Transport(TransportError::AuthFailed(_)) => ErrorKind::Auth,
            Failure::Transport(_) => ErrorKind::Connect,
        }
    }

    /// Auth rejections and initiation errors are never retried automatically.
    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Failure::Transport(TransportError::AuthFailed(_) | TransportError::Initiation(_))
        )
    }

    fn initiation_error(&self) -> Option<&TransportError> {
        match self {
            Failure::Transport(err @ TransportError::Initiation(_)) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Transport(err) => write!(f, "{err}"),
            Failure::Timeout(after) => write!(f, "connect timed out after {}ms", after.as_millis()),
        }
    }
}

/// Everything an actor is built from.
pub(crate) struct Wiring {
    pub transport: Box<dyn Transport>,
    pub credentials: Credentials,
    pub config: ManagerConfig,
    pub bus: Arc<dyn Broadcast>,
    pub retry_backoff: Option<RetryBackoffFn>,
    pub streams: Arc<Streams>,
    pub state_tx: watch::Sender<ConnectionState>,
    pub commands: mpsc::UnboundedReceiver<Command>,
}

pub(crate) struct Actor {
    /// Taken out for the duration of a connect attempt.
    transport: Option<Box<dyn Transport>>,
    credentials: Credentials,
    config: ManagerConfig,
    queue: OutboundQueue,
    metrics: MetricsSink,
    backoff: Backoff,
    bus: Arc<dyn Broadcast>,
    streams: Arc<Streams>,
    state_tx: watch::Sender<ConnectionState>,
    state: ConnectionState,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Events from the current connection only.
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,

    intentional_close: bool,
    online: bool,
    reconnect_attempt: u32,
    attempt_pending: bool,
    metrics_dirty: bool,
    disposed: bool,

    reconnect_at: Option<Instant>,
    flush_at: Option<Instant>,
    sweep_at: Option<Instant>,
    window_at: Option<Instant>,

    /// `connect()` callers waiting for the current attempt to settle.
    waiters: Vec<Reply<Result<ConnectionState>>>,
}

/// Current time on the clock the queue and metrics share with tokio timers.
fn clock() -> std::time::Instant {
    Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Actor {
    pub(crate) fn new(wiring: Wiring) -> Self {
        let Wiring {
            transport,
            credentials,
            config,
            bus,
            retry_backoff,
            streams,
            state_tx,
            commands,
        } = wiring;

        let seed = config.jitter_seed;
        let mut queue = OutboundQueue::new(config.queue.clone(), seed.map(|s| s.wrapping_add(1)));
        if let Some(retry_backoff) = retry_backoff {
            queue = queue.with_retry_backoff(retry_backoff);
        }
        let backoff = Backoff::with_seed(config.reconnect.policy(), seed);
        let window_at = config.metrics.window().map(|window| Instant::now() + window);

        Actor {
            transport: Some(transport),
            credentials,
            queue,
            metrics: MetricsSink::new(clock()),
            backoff,
            bus,
            streams,
            state_tx,
            state: ConnectionState::Idle,
            commands,
            events: None,
            intentional_close: false,
            online: true,
            reconnect_attempt: 0,
            attempt_pending: false,
            metrics_dirty: false,
            disposed: false,
            reconnect_at: None,
            flush_at: None,
            sweep_at: None,
            window_at,
            waiters: Vec::new(),
            config,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(url = %self.credentials.url, "connection actor started");
        loop {
            if self.metrics_dirty {
                self.publish_metrics();
            }
            if self.disposed {
                break;
            }
            if self.attempt_pending {
                self.attempt_pending = false;
                self.attempt().await;
                continue;
            }

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => self.shutdown(None).await,
                },
                event = next_event(&mut self.events) => match event {
                    Some(event) => self.on_transport_event(event).await,
                    None => self.events = None,
                },
                () = wait_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.attempt_pending = true;
                }
                () = wait_until(self.flush_at) => {
                    self.flush_at = None;
                    self.flush();
                }
                () = wait_until(self.sweep_at) => self.sweep(),
                () = wait_until(self.window_at) => {
                    self.metrics_dirty = true;
                    self.window_at = self.config.metrics.window().map(|window| Instant::now() + window);
                }
            }
        }
        debug!("connection actor stopped");
    }

    async fn handle(&mut self, command: Command) {
        let Some(control) = self.handle_local(command) else {
            return;
        };
        match control {
            Control::Connect(reply) => self.connect(reply),
            Control::Disconnect { reconnect, reply } => {
                self.disconnect(reconnect).await;
                let _ = reply.send(());
            }
            Control::Network(online) => self.set_network_status(online).await,
            Control::Dispose(reply) => self.shutdown(Some(reply)).await,
        }
    }

    /// Serves commands that never touch the connection. Returns the rest.
    fn handle_local(&mut self, command: Command) -> Option<Control> {
        match command {
            Command::Control(control) => return Some(control),
            Command::Send { envelope, options } => self.send(envelope, options),
            Command::Metrics(reply) => {
                let _ = reply.send(self.metrics.snapshot(clock()));
            }
            Command::ResetMetrics { options, reply } => {
                self.metrics.reset(options, clock());
                self.metrics_dirty = true;
                let _ = reply.send(());
            }
            Command::QueueSnapshot(reply) => {
                let _ = reply.send(self.queue.snapshot(clock()));
            }
            Command::GiveupSnapshot(reply) => {
                let _ = reply.send(self.queue.giveup_snapshot(clock()));
            }
            Command::ClearQueue(reply) => {
                let cleared = self.queue.clear();
                debug!(cleared, "cleared outbound queue");
                self.drain_queue_events();
                let _ = reply.send(cleared);
            }
            Command::ClearGiveups(reply) => {
                let cleared = self.queue.clear_giveups();
                debug!(cleared, "cleared giveup queue");
                let _ = reply.send(cleared);
            }
        }
        None
    }

    fn connect(&mut self, reply: Reply<Result<ConnectionState>>) {
        match self.state {
            ConnectionState::Connected => {
                let _ = reply.send(Ok(ConnectionState::Connected));
                return;
            }
            ConnectionState::Reconnecting => {
                // Skip the remaining backoff and try now.
                self.intentional_close = false;
                self.reconnect_at = None;
            }
            _ => {
                self.intentional_close = false;
                self.reconnect_attempt = 0;
                self.reconnect_at = None;
                self.transition(ConnectionState::Connecting, "connect requested", None);
            }
        }
        self.waiters.push(reply);
        self.attempt_pending = true;
    }

    /// Runs one connect attempt to completion, timeout or abort.
    async fn attempt(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            warn!("no transport available for connect attempt");
            let missing = TransportError::Initiation("no transport available".to_string());
            self.on_connect_failed(Failure::Transport(missing));
            return;
        };
        let (sink, events) = mpsc::unbounded_channel();
        self.events = None;
        self.flush_at = None;
        let timeout = self.config.timeouts.connect_timeout();
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        debug!(
            url = %self.credentials.url,
            attempt = self.reconnect_attempt,
            "starting connect attempt"
        );

        let outcome = {
            let mut connect = transport.connect(&self.credentials, sink);
            loop {
                tokio::select! {
                    result = &mut connect => break Attempt::Finished(result),
                    () = wait_until(deadline) => {
                        break Attempt::TimedOut(timeout.unwrap_or_default());
                    }
                    command = self.commands.recv() => {
                        let abort = match command {
                            Some(command) => match self.handle_local(command) {
                                Some(control) => self.control_during_attempt(control),
                                None => None,
                            },
                            None => Some(Abort::Dispose(None)),
                        };
                        if let Some(abort) = abort {
                            break Attempt::Aborted(abort);
                        }
                    }
                }
            }
        };
        self.transport = Some(transport);

        match outcome {
            Attempt::Finished(Ok(())) => self.on_connected(events),
            Attempt::Finished(Err(err)) => self.on_connect_failed(Failure::Transport(err)),
            Attempt::TimedOut(after) => {
                self.close_transport("connect timeout").await;
                self.on_connect_failed(Failure::Timeout(after));
            }
            Attempt::Aborted(abort) => self.on_attempt_aborted(abort).await,
        }
    }

    fn control_during_attempt(&mut self, control: Control) -> Option<Abort> {
        match control {
            Control::Connect(reply) => {
                debug!("joining in-flight connect attempt");
                self.waiters.push(reply);
                None
            }
            Control::Disconnect { reconnect, reply } => {
                self.intentional_close = !reconnect;
                Some(Abort::Disconnect { reconnect, reply })
            }
            Control::Network(online) => {
                if online == self.online {
                    return None;
                }
                self.online = online;
                info!(online, "network status changed");
                (!online).then_some(Abort::Offline)
            }
            Control::Dispose(reply) => Some(Abort::Dispose(Some(reply))),
        }
    }

    async fn on_attempt_aborted(&mut self, abort: Abort) {
        match abort {
            Abort::Disconnect { reconnect, reply } => {
                debug!(reconnect, "connect attempt aborted by disconnect");
                self.close_transport("disconnect requested").await;
                self.after_disconnect(reconnect);
                let _ = reply.send(());
            }
            Abort::Offline => {
                debug!("connect attempt aborted, network offline");
                self.close_transport("network offline").await;
                self.transition(ConnectionState::Offline, "network offline", None);
                self.resolve_waiters(ConnectionState::Offline);
            }
            Abort::Dispose(reply) => self.shutdown(reply).await,
        }
    }

    fn on_connected(&mut self, events: mpsc::UnboundedReceiver<TransportEvent>) {
        let was_reconnect =
            self.reconnect_attempt > 0 || self.state == ConnectionState::Reconnecting;
        self.reconnect_attempt = 0;
        self.reconnect_at = None;
        self.events = Some(events);

        self.metrics.record_connect_success(was_reconnect);
        self.metrics.open_session(clock());
        self.metrics_dirty = true;

        let reason = if was_reconnect { "reconnected" } else { "connected" };
        self.transition(ConnectionState::Connected, reason, None);
        self.resolve_waiters(ConnectionState::Connected);
        self.flush();
    }

    fn on_connect_failed(&mut self, failure: Failure) {
        let message = failure.to_string();
        warn!(error = %message, attempt = self.reconnect_attempt, "connect attempt failed");
        self.metrics.record_connect_failure();
        self.metrics.close_session(clock());
        self.metrics_dirty = true;
        self.publish_error(failure.kind(), message.clone());

        if !self.online {
            self.transition(ConnectionState::Offline, "network offline", None);
            self.resolve_waiters(ConnectionState::Offline);
            return;
        }

        let attempt = (self.reconnect_attempt > 0).then_some(self.reconnect_attempt);
        self.transition(ConnectionState::Failed, &message, attempt);
        let initiation = failure.initiation_error();
        for waiter in self.waiters.drain(..) {
            let result = match initiation {
                Some(err) => Err(Error::Transport(err.clone())),
                None => Ok(ConnectionState::Failed),
            };
            let _ = waiter.send(result);
        }

        if failure.is_retryable() && self.config.reconnect.enabled && !self.intentional_close {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        let next = self.reconnect_attempt + 1;
        if let Some(max) = self.config.reconnect.max_attempts {
            if next > max {
                warn!(attempts = self.reconnect_attempt, "reconnect attempts exhausted");
                self.publish_error(
                    ErrorKind::ReconnectExhausted,
                    format!("gave up after {} reconnect attempts", self.reconnect_attempt),
                );
                return;
            }
        }

        self.reconnect_attempt = next;
        let delay = self.backoff.delay(next);
        self.metrics.bump(Counter::ReconnectAttempts, 1);
        self.metrics_dirty = true;
        info!(
            attempt = next,
            delay_ms = delay.jittered_ms,
            "scheduling reconnect"
        );
        self.transition(ConnectionState::Reconnecting, "reconnect scheduled", Some(next));
        self.reconnect_at = Some(Instant::now() + delay.jittered());
    }

    async fn disconnect(&mut self, reconnect: bool) {
        info!(reconnect, "disconnect requested");
        self.intentional_close = !reconnect;
        self.reconnect_at = None;
        self.flush_at = None;
        self.attempt_pending = false;
        self.metrics.close_session(clock());
        self.metrics_dirty = true;
        self.events = None;
        self.close_transport("disconnect requested").await;
        self.after_disconnect(reconnect);
    }

    fn after_disconnect(&mut self, reconnect: bool) {
        self.reconnect_at = None;
        if reconnect {
            self.reconnect_attempt = 0;
            self.transition(ConnectionState::Reconnecting, "reconnect requested", None);
            self.attempt_pending = true;
            return;
        }
        if self.state != ConnectionState::Idle {
            self.transition(ConnectionState::Disconnected, "disconnect requested", None);
        }
        self.resolve_waiters(ConnectionState::Disconnected);
    }

    async fn set_network_status(&mut self, online: bool) {
        if online == self.online {
            return;
        }
        self.online = online;
        info!(online, "network status changed");

        if !online {
            if !matches!(
                self.state,
                ConnectionState::Connecting
                    | ConnectionState::Connected
                    | ConnectionState::Reconnecting
                    | ConnectionState::Failed
            ) {
                return;
            }
            self.reconnect_at = None;
            self.flush_at = None;
            if self.state == ConnectionState::Connected {
                self.metrics.close_session(clock());
                self.events = None;
                self.close_transport("network offline").await;
            }
            self.transition(ConnectionState::Offline, "network offline", None);
            return;
        }

        if self.intentional_close
            || !matches!(
                self.state,
                ConnectionState::Offline | ConnectionState::Disconnected | ConnectionState::Failed
            )
        {
            return;
        }
        self.reconnect_attempt = 0;
        self.reconnect_at = None;
        self.transition(ConnectionState::Reconnecting, "network online", None);
        self.attempt_pending = true;
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Inbound(envelope) => {
                self.metrics.bump(Counter::MessagesIn, 1);
                self.metrics_dirty = true;
                self.streams.inbound.publish(envelope);
            }
            TransportEvent::RoundTrip(rtt) => {
                self.metrics.record_rtt(rtt);
                self.metrics_dirty = true;
            }
            TransportEvent::Status { status, error } => self.on_status(status, error).await,
        }
    }

    async fn on_status(&mut self, status: TransportStatus, error: Option<String>) {
        debug!(%status, ?error, "transport status");
        if self.state != ConnectionState::Connected || !status.is_loss() {
            return;
        }

        self.metrics.close_session(clock());
        self.metrics_dirty = true;
        self.events = None;
        self.flush_at = None;

        let message = error.unwrap_or_else(|| format!("transport reported {status}"));
        match status {
            TransportStatus::AuthFailure => self.publish_error(ErrorKind::Auth, message.clone()),
            TransportStatus::Disconnected => {}
            _ => self.publish_error(ErrorKind::Transport, message.clone()),
        }
        warn!(%status, reason = %message, "connection lost");
        self.close_transport("connection lost").await;

        if self.intentional_close {
            self.transition(ConnectionState::Disconnected, &message, None);
        } else if !self.online {
            self.transition(ConnectionState::Offline, "network offline", None);
        } else if status == TransportStatus::AuthFailure || !self.config.reconnect.enabled {
            self.transition(ConnectionState::Failed, &message, None);
        } else {
            self.schedule_reconnect();
        }
    }

    fn send(&mut self, envelope: Envelope, options: EnqueueOptions) {
        // Queued items go first; a direct send would overtake them.
        if self.state == ConnectionState::Connected && self.queue.is_empty() {
            if let Some(transport) = self.transport.as_mut().filter(|t| t.is_connected()) {
                match transport.send(&envelope) {
                    Ok(()) => {
                        self.metrics.bump(Counter::MessagesOut, 1);
                        self.metrics_dirty = true;
                        self.streams.outbound.publish(envelope);
                    }
                    Err(err) => {
                        warn!(error = %err, "direct send failed, queueing");
                        self.publish_error(ErrorKind::Send, err.to_string());
                        self.enqueue(envelope, options);
                        self.schedule_flush(Instant::now() + MIN_FLUSH_YIELD);
                    }
                }
                return;
            }
        }

        self.enqueue(envelope, options);
        if self.state == ConnectionState::Connected {
            self.flush();
        }
    }

    fn enqueue(&mut self, envelope: Envelope, options: EnqueueOptions) {
        self.metrics.bump(Counter::OutboundQueued, 1);
        self.metrics_dirty = true;
        match self.queue.enqueue(envelope, options, clock()) {
            Ok(EnqueueOutcome::Queued { id, evicted }) => {
                debug!(%id, ?evicted, pending = self.queue.len(), "queued outbound envelope");
            }
            Ok(EnqueueOutcome::Refused { id, reason }) => {
                debug!(%id, ?reason, "outbound envelope refused");
            }
            Err(err) => {
                warn!(error = %err, "outbound queue full");
                self.publish_error(ErrorKind::QueueFull, err.to_string());
            }
        }
        self.drain_queue_events();
        self.arm_sweep();
    }

    fn flush(&mut self) {
        let connected = self.state == ConnectionState::Connected
            && self.transport.as_ref().is_some_and(|t| t.is_connected());
        let slot = &mut self.transport;
        let outbound = &self.streams.outbound;
        let report = self.queue.flush_if_possible(clock(), connected, |item| {
            let transport = slot.as_mut().ok_or(TransportError::ConnectionClosed)?;
            transport.send(&item.envelope)?;
            outbound.publish(item.envelope.clone());
            Ok::<(), TransportError>(())
        });

        let sent = report.sent.len() as u64;
        if sent > 0 || report.failed > 0 || report.expired > 0 {
            debug!(
                sent,
                failed = report.failed,
                expired = report.expired,
                remaining = report.remaining,
                "flushed outbound queue"
            );
        }
        if sent > 0 {
            self.metrics.bump(Counter::OutboundSent, sent);
            self.metrics.bump(Counter::MessagesOut, sent);
            self.metrics_dirty = true;
        }
        self.drain_queue_events();

        self.flush_at = if connected {
            report.next_wake.map(Instant::from_std)
        } else {
            None
        };
    }

    fn schedule_flush(&mut self, at: Instant) {
        self.flush_at = Some(match self.flush_at {
            Some(existing) => existing.min(at),
            None => at,
        });
    }

    fn sweep(&mut self) {
        self.sweep_at = None;
        let expired = self.queue.expire_stale(clock());
        if expired > 0 {
            debug!(expired, "expired stale outbound items");
            self.drain_queue_events();
        }
        self.arm_sweep();
    }

    /// Arms the expiry sweep while a global TTL is set and items are pending.
    fn arm_sweep(&mut self) {
        if self.sweep_at.is_some() || self.queue.is_empty() || self.queue.config().ttl().is_none() {
            return;
        }
        let interval = Duration::from_millis(self.queue.config().ttl_sweep_interval_ms.max(1));
        self.sweep_at = Some(Instant::now() + interval);
    }

    fn drain_queue_events(&mut self) {
        for event in self.queue.take_events() {
            debug!(kind = event.kind(), id = %event.id(), "queue event");
            self.metrics.apply_queue_event(&event);
            self.streams.queue.publish(event);
            self.metrics_dirty = true;
        }
    }

    async fn close_transport(&mut self, reason: &str) {
        if let Some(transport) = self.transport.as_mut() {
            if let Err(err) = transport.disconnect(reason).await {
                warn!(error = %err, "transport disconnect failed");
            }
        }
    }

    async fn shutdown(&mut self, reply: Option<Reply<()>>) {
        if self.disposed {
            if let Some(reply) = reply {
                let _ = reply.send(());
            }
            return;
        }
        info!("disposing connection manager");

        self.reconnect_at = None;
        self.flush_at = None;
        self.sweep_at = None;
        self.window_at = None;
        self.attempt_pending = false;
        self.intentional_close = true;
        self.metrics.close_session(clock());
        self.events = None;
        self.close_transport("disposed").await;

        if self.state.is_active() {
            self.transition(ConnectionState::Disconnected, "disposed", None);
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(Error::Disposed));
        }
        self.publish_metrics();

        self.commands.close();
        self.streams.close_all();
        self.disposed = true;
        if let Some(reply) = reply {
            let _ = reply.send(());
        }
    }

    fn resolve_waiters(&mut self, state: ConnectionState) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(state));
        }
    }

    fn transition(&mut self, state: ConnectionState, reason: &str, attempt: Option<u32>) {
        if self.state == state {
            return;
        }
        let change = StateChange {
            state,
            previous: self.state,
            reason: reason.to_string(),
            attempt,
            at: Utc::now(),
        };
        info!(from = %change.previous, to = %state, reason, "connection state changed");

        self.state = state;
        self.state_tx.send_replace(state);
        self.metrics.record_state_change(clock());
        self.metrics_dirty = true;

        match serde_json::to_value(&change) {
            Ok(message) => self.bus.publish(STATE_TOPIC, message),
            Err(err) => warn!(error = %err, "failed to encode state change"),
        }
        self.streams.state.publish(change);
    }

    fn publish_error(&self, kind: ErrorKind, message: impl Into<String>) {
        self.streams.errors.publish(ErrorEvent::new(kind, message));
    }

    fn publish_metrics(&mut self) {
        self.metrics_dirty = false;
        if self.streams.metrics.has_subscribers() {
            self.streams.metrics.publish(self.metrics.snapshot(clock()));
        }
    }
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod tests;
