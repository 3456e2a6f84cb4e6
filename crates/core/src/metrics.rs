// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection health metrics.
//!
//! [`MetricsSink`] accumulates counters, session durations and round-trip
//! statistics. Durations are measured against monotonic instants supplied by
//! the owner; wall-clock timestamps are only reported for display.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::QueueEvent;

/// A counter that can be bumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    ReconnectAttempts,
    ReconnectSuccesses,
    /// Reset to zero by [`MetricsSink::record_connect_success`].
    ConsecutiveFailures,
    MessagesIn,
    MessagesOut,
    OutboundQueued,
    OutboundSent,
    OutboundDropped,
    OutboundExpired,
    OutboundRetried,
    OutboundGiveups,
    OutboundQueueFull,
}

/// Round-trip time statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RttStats {
    pub samples: u64,
    pub last_ms: Option<u64>,
    pub min_ms: Option<u64>,
    pub max_ms: Option<u64>,
    pub avg_ms: Option<f64>,
    #[serde(skip)]
    total_ms: u64,
}

impl RttStats {
    fn record(&mut self, rtt: Duration) {
        let ms = u64::try_from(rtt.as_millis()).unwrap_or(u64::MAX);
        self.samples += 1;
        self.total_ms = self.total_ms.saturating_add(ms);
        self.last_ms = Some(ms);
        self.min_ms = Some(self.min_ms.map_or(ms, |min| min.min(ms)));
        self.max_ms = Some(self.max_ms.map_or(ms, |max| max.max(ms)));
        self.avg_ms = Some(self.total_ms as f64 / self.samples as f64);
    }
}

/// Point-in-time view of connection health.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Closed sessions plus the open one, if any.
    pub total_uptime_ms: u64,
    pub session_count: u64,
    pub current_session_start: Option<DateTime<Utc>>,
    pub current_session_ms: Option<u64>,
    pub last_session_duration_ms: Option<u64>,

    pub reconnect_attempts: u64,
    pub reconnect_successes: u64,
    pub consecutive_failures: u64,

    pub messages_in: u64,
    pub messages_out: u64,

    pub outbound_queued: u64,
    pub outbound_sent: u64,
    pub outbound_dropped: u64,
    pub outbound_expired: u64,
    pub outbound_retried: u64,
    pub outbound_giveups: u64,
    pub outbound_queue_full: u64,

    pub rtt: RttStats,

    pub last_state_change: Option<DateTime<Utc>>,
    pub since_last_state_change_ms: Option<u64>,
    pub last_reset: DateTime<Utc>,
    pub since_last_reset_ms: u64,
}

/// Options for [`MetricsSink::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOptions {
    /// Keep round-trip statistics.
    #[serde(default)]
    pub preserve_rtt: bool,
    /// Keep cumulative counters and session totals.
    #[serde(default)]
    pub preserve_counts: bool,
}

#[derive(Debug, Clone, Copy)]
struct Stamp {
    instant: Instant,
    at: DateTime<Utc>,
}

impl Stamp {
    fn new(instant: Instant) -> Self {
        Stamp {
            instant,
            at: Utc::now(),
        }
    }

    fn elapsed_ms(&self, now: Instant) -> u64 {
        millis(now.saturating_duration_since(self.instant))
    }
}

#[derive(Debug, Clone, Default)]
struct Counts {
    total_uptime: Duration,
    session_count: u64,
    last_session_duration: Option<Duration>,
    reconnect_attempts: u64,
    reconnect_successes: u64,
    consecutive_failures: u64,
    messages_in: u64,
    messages_out: u64,
    outbound_queued: u64,
    outbound_sent: u64,
    outbound_dropped: u64,
    outbound_expired: u64,
    outbound_retried: u64,
    outbound_giveups: u64,
    outbound_queue_full: u64,
}

/// Accumulates connection health metrics.
#[derive(Debug, Clone)]
pub struct MetricsSink {
    counts: Counts,
    rtt: RttStats,
    session: Option<Stamp>,
    last_state_change: Option<Stamp>,
    last_reset: Stamp,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl MetricsSink {
    pub fn new(now: Instant) -> Self {
        MetricsSink {
            counts: Counts::default(),
            rtt: RttStats::default(),
            session: None,
            last_state_change: None,
            last_reset: Stamp::new(now),
        }
    }

    pub fn bump(&mut self, counter: Counter, amount: u64) {
        let c = &mut self.counts;
        let slot = match counter {
            Counter::ReconnectAttempts => &mut c.reconnect_attempts,
            Counter::ReconnectSuccesses => &mut c.reconnect_successes,
            Counter::ConsecutiveFailures => &mut c.consecutive_failures,
            Counter::MessagesIn => &mut c.messages_in,
            Counter::MessagesOut => &mut c.messages_out,
            Counter::OutboundQueued => &mut c.outbound_queued,
            Counter::OutboundSent => &mut c.outbound_sent,
            Counter::OutboundDropped => &mut c.outbound_dropped,
            Counter::OutboundExpired => &mut c.outbound_expired,
            Counter::OutboundRetried => &mut c.outbound_retried,
            Counter::OutboundGiveups => &mut c.outbound_giveups,
            Counter::OutboundQueueFull => &mut c.outbound_queue_full,
        };
        *slot = slot.saturating_add(amount);
    }

    /// Current value of a counter.
    pub fn get(&self, counter: Counter) -> u64 {
        let c = &self.counts;
        match counter {
            Counter::ReconnectAttempts => c.reconnect_attempts,
            Counter::ReconnectSuccesses => c.reconnect_successes,
            Counter::ConsecutiveFailures => c.consecutive_failures,
            Counter::MessagesIn => c.messages_in,
            Counter::MessagesOut => c.messages_out,
            Counter::OutboundQueued => c.outbound_queued,
            Counter::OutboundSent => c.outbound_sent,
            Counter::OutboundDropped => c.outbound_dropped,
            Counter::OutboundExpired => c.outbound_expired,
            Counter::OutboundRetried => c.outbound_retried,
            Counter::OutboundGiveups => c.outbound_giveups,
            Counter::OutboundQueueFull => c.outbound_queue_full,
        }
    }

    /// Records a failed connection attempt.
    pub fn record_connect_failure(&mut self) {
        self.bump(Counter::ConsecutiveFailures, 1);
    }

    /// Records a successful connection; clears the failure streak.
    pub fn record_connect_success(&mut self, was_reconnect: bool) {
        self.counts.consecutive_failures = 0;
        if was_reconnect {
            self.bump(Counter::ReconnectSuccesses, 1);
        }
    }

    /// Opens a session. No-op if one is already open.
    pub fn open_session(&mut self, now: Instant) {
        if self.session.is_some() {
            return;
        }
        self.session = Some(Stamp::new(now));
        self.counts.session_count += 1;
    }

    /// Closes the open session, if any, and returns its duration.
    pub fn close_session(&mut self, now: Instant) -> Option<Duration> {
        let stamp = self.session.take()?;
        let duration = now.saturating_duration_since(stamp.instant);
        self.counts.total_uptime = self.counts.total_uptime.saturating_add(duration);
        self.counts.last_session_duration = Some(duration);
        Some(duration)
    }

    pub fn record_rtt(&mut self, rtt: Duration) {
        self.rtt.record(rtt);
    }

    pub fn record_state_change(&mut self, now: Instant) {
        self.last_state_change = Some(Stamp::new(now));
    }

    /// Applies the counter effect of a queue event.
    pub fn apply_queue_event(&mut self, event: &QueueEvent) {
        let counter = match event {
            QueueEvent::QueueFull { .. } => Counter::OutboundQueueFull,
            QueueEvent::Dropped { .. } => Counter::OutboundDropped,
            QueueEvent::Expired { .. } => Counter::OutboundExpired,
            QueueEvent::RetryScheduled { .. } => Counter::OutboundRetried,
            QueueEvent::RetryGiveup { .. } => Counter::OutboundGiveups,
            QueueEvent::GiveupStored { .. } => return,
        };
        self.bump(counter, 1);
    }

    pub fn snapshot(&self, now: Instant) -> HealthMetrics {
        let c = &self.counts;
        let current_session_ms = self.session.map(|s| s.elapsed_ms(now));
        let total_uptime_ms = millis(c.total_uptime).saturating_add(current_session_ms.unwrap_or(0));

        HealthMetrics {
            total_uptime_ms,
            session_count: c.session_count,
            current_session_start: self.session.map(|s| s.at),
            current_session_ms,
            last_session_duration_ms: c.last_session_duration.map(millis),
            reconnect_attempts: c.reconnect_attempts,
            reconnect_successes: c.reconnect_successes,
            consecutive_failures: c.consecutive_failures,
            messages_in: c.messages_in,
            messages_out: c.messages_out,
            outbound_queued: c.outbound_queued,
            outbound_sent: c.outbound_sent,
            outbound_dropped: c.outbound_dropped,
            outbound_expired: c.outbound_expired,
            outbound_retried: c.outbound_retried,
            outbound_giveups: c.outbound_giveups,
            outbound_queue_full: c.outbound_queue_full,
            rtt: self.rtt.clone(),
            last_state_change: self.last_state_change.map(|s| s.at),
            since_last_state_change_ms: self.last_state_change.map(|s| s.elapsed_ms(now)),
            last_reset: self.last_reset.at,
            since_last_reset_ms: self.last_reset.elapsed_ms(now),
        }
    }

    /// Resets metrics. The open session, if any, keeps its start time.
    pub fn reset(&mut self, options: ResetOptions, now: Instant) {
        if !options.preserve_counts {
            self.counts = Counts::default();
            if self.session.is_some() {
                self.counts.session_count = 1;
            }
        }
        if !options.preserve_rtt {
            self.rtt = RttStats::default();
        }
        let stamp = Stamp::new(now);
        self.last_reset = stamp;
        if self.last_state_change.is_some() {
            self.last_state_change = Some(stamp);
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
