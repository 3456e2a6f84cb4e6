// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound queue with priorities, TTL expiry and retry bookkeeping.
//!
//! Items are kept ordered by `(priority, next_eligible_at, enqueued_at, id)`
//! where an item with no scheduled retry sorts before any item with one.
//! Every item that leaves the active queue does so exactly once, as sent,
//! expired, dropped or given up; given-up items are retained until
//! [`OutboundQueue::clear_giveups`].
//!
//! The queue never reads a clock or talks to the network itself. The owner
//! passes the current instant and, when flushing, a send function.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::backoff;
use crate::config::{DropStrategy, QueueConfig};
use crate::envelope::Envelope;
use crate::events::{DropReason, ItemId, QueueEvent};

/// Smallest delay before re-flushing after a pass that made no progress.
pub const MIN_FLUSH_YIELD: Duration = Duration::from_millis(10);

/// Caller-supplied retry delay in milliseconds for a 1-based attempt.
///
/// Results that are negative or not finite fall back to the configured
/// exponential backoff.
pub type RetryBackoffFn = Arc<dyn Fn(u32) -> f64 + Send + Sync>;

/// Errors returned by [`OutboundQueue::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("outbound queue is full ({size} items), refused {id}")]
    Full { id: ItemId, size: usize },
}

/// Per-item options for [`OutboundQueue::enqueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueOptions {
    /// Priority level; 0 is the highest. Clamped to the configured levels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    /// Overrides the global TTL for this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
    /// Overrides `max_send_retries` for this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// What happened to an enqueued envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The item is queued; another item may have been evicted for it.
    Queued { id: ItemId, evicted: Option<ItemId> },
    /// The item was not queued.
    Refused { id: ItemId, reason: DropReason },
}

impl EnqueueOutcome {
    pub fn id(&self) -> ItemId {
        match self {
            EnqueueOutcome::Queued { id, .. } | EnqueueOutcome::Refused { id, .. } => *id,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued { .. })
    }
}

/// An item waiting to be sent.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: ItemId,
    pub envelope: Envelope,
    pub enqueued_at: Instant,
    pub priority: u8,
    /// Failed send attempts so far.
    pub attempt: u32,
    pub max_attempts: u32,
    pub next_eligible_at: Option<Instant>,
    pub ttl_override: Option<Duration>,
    pub last_error: Option<String>,
}

type SortKey = (u8, Option<Instant>, Instant, ItemId);

impl QueueItem {
    fn sort_key(&self) -> SortKey {
        (self.priority, self.next_eligible_at, self.enqueued_at, self.id)
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

/// Read-only projection of a queued or given-up item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub priority: u8,
    pub attempt: u32,
    pub max_attempts: u32,
    pub age_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_remaining_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_send_in_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Lifetime totals. `enqueued == sent + expired + dropped + given_up + len()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub sent: u64,
    pub expired: u64,
    pub dropped: u64,
    pub given_up: u64,
    pub retried: u64,
}

/// Result of one flush pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Ids sent successfully, in send order.
    pub sent: Vec<ItemId>,
    pub failed: usize,
    pub expired: usize,
    pub remaining: usize,
    /// When the owner should flush again, if anything is left.
    pub next_wake: Option<Instant>,
}

pub struct OutboundQueue {
    config: QueueConfig,
    items: Vec<QueueItem>,
    giveups: Vec<QueueItem>,
    next_id: u64,
    rng: StdRng,
    custom_backoff: Option<RetryBackoffFn>,
    events: Vec<QueueEvent>,
    stats: QueueStats,
}

impl fmt::Debug for OutboundQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundQueue")
            .field("len", &self.items.len())
            .field("giveups", &self.giveups.len())
            .field("stats", &self.stats)
            .field("custom_backoff", &self.custom_backoff.is_some())
            .finish()
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl OutboundQueue {
    /// Creates a queue. `seed` makes retry jitter reproducible.
    pub fn new(config: QueueConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        OutboundQueue {
            config,
            items: Vec::new(),
            giveups: Vec::new(),
            next_id: 1,
            rng,
            custom_backoff: None,
            events: Vec::new(),
            stats: QueueStats::default(),
        }
    }

    pub fn with_retry_backoff(mut self, backoff: RetryBackoffFn) -> Self {
        self.custom_backoff = Some(backoff);
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn giveup_len(&self) -> usize {
        self.giveups.len()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    /// Ids of active items in processing order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    /// Drains events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<QueueEvent> {
        std::mem::take(&mut self.events)
    }

    /// Adds an envelope to the queue.
    ///
    /// Returns `Err(QueueError::Full)` only under the `error` drop strategy;
    /// other refusals are reported as [`EnqueueOutcome::Refused`].
    pub fn enqueue(
        &mut self,
        envelope: Envelope,
        options: EnqueueOptions,
        now: Instant,
    ) -> Result<EnqueueOutcome, QueueError> {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.stats.enqueued += 1;

        if !self.config.enabled {
            debug!(%id, "queue disabled, dropping item");
            self.drop_item(id, DropReason::Disabled);
            return Ok(EnqueueOutcome::Refused {
                id,
                reason: DropReason::Disabled,
            });
        }

        let mut evicted = None;
        if self.items.len() >= self.config.max_size {
            let size = self.items.len();
            let strategy = self.config.drop_strategy;
            self.events.push(QueueEvent::QueueFull { id, size, strategy });

            match strategy {
                DropStrategy::DropOldest => {
                    if let Some(victim) = self.evict_oldest() {
                        debug!(%id, evicted = %victim, "queue full, evicted oldest item");
                        evicted = Some(victim);
                    }
                }
                DropStrategy::DropNewest => {
                    debug!(%id, size, "queue full, refusing new item");
                    self.drop_item(id, DropReason::Refused);
                    return Ok(EnqueueOutcome::Refused {
                        id,
                        reason: DropReason::Refused,
                    });
                }
                DropStrategy::Error => {
                    warn!(%id, size, "queue full");
                    self.drop_item(id, DropReason::Refused);
                    return Err(QueueError::Full { id, size });
                }
            }
        }

        let max_level = self.config.priorities.saturating_sub(1);
        let priority = options
            .priority
            .unwrap_or_else(|| self.config.default_priority())
            .min(max_level);

        self.insert(QueueItem {
            id,
            envelope,
            enqueued_at: now,
            priority,
            attempt: 0,
            max_attempts: options
                .max_attempts
                .unwrap_or(self.config.max_send_retries)
                .max(1),
            next_eligible_at: None,
            ttl_override: options.ttl,
            last_error: None,
        });

        Ok(EnqueueOutcome::Queued { id, evicted })
    }

    /// Sends eligible items through `send`, up to one batch.
    ///
    /// Does nothing when the queue is disabled, `connected` is false or the
    /// queue is empty. Stops at the first item whose retry is not yet due, and
    /// after a failure if the failed item is still at the head.
    pub fn flush_if_possible<F, E>(&mut self, now: Instant, connected: bool, mut send: F) -> FlushReport
    where
        F: FnMut(&QueueItem) -> Result<(), E>,
        E: fmt::Display,
    {
        let mut report = FlushReport::default();
        if !self.config.enabled || !connected || self.items.is_empty() {
            report.remaining = self.items.len();
            return report;
        }

        let mut processed = 0;
        while processed < self.config.flush_batch_size {
            let Some(head) = self.items.first() else {
                break;
            };
            if head.next_eligible_at.is_some_and(|at| at > now) {
                break;
            }
            processed += 1;

            if self.is_expired(head, now) {
                let item = self.items.remove(0);
                self.expire(item, now);
                report.expired += 1;
                continue;
            }

            match send(&self.items[0]) {
                Ok(()) => {
                    let item = self.items.remove(0);
                    self.stats.sent += 1;
                    report.sent.push(item.id);
                }
                Err(err) => {
                    report.failed += 1;
                    let item = self.items.remove(0);
                    if let Some(id) = self.schedule_retry(item, err.to_string(), now) {
                        if self.items.first().map(|head| head.id) == Some(id) {
                            break;
                        }
                    }
                }
            }
        }

        let progressed = !report.sent.is_empty() || report.expired > 0;
        report.remaining = self.items.len();
        report.next_wake = self.items.first().map(|head| match head.next_eligible_at {
            Some(at) if at > now => at,
            _ if !progressed => now + MIN_FLUSH_YIELD,
            _ => now,
        });
        report
    }

    /// Removes every active item whose TTL has elapsed. Returns the count.
    pub fn expire_stale(&mut self, now: Instant) -> usize {
        let (stale, fresh): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| self.is_expired(item, now));
        self.items = fresh;
        let count = stale.len();
        for item in stale {
            self.expire(item, now);
        }
        count
    }

    /// Drops every active item. Returns the count.
    pub fn clear(&mut self) -> usize {
        let items = std::mem::take(&mut self.items);
        let count = items.len();
        for item in items {
            self.drop_item(item.id, DropReason::Cleared);
        }
        count
    }

    /// Forgets every given-up item. Returns the count.
    pub fn clear_giveups(&mut self) -> usize {
        let count = self.giveups.len();
        self.giveups.clear();
        count
    }

    pub fn snapshot(&self, now: Instant) -> Vec<ItemSnapshot> {
        self.items.iter().map(|item| self.project(item, now)).collect()
    }

    pub fn giveup_snapshot(&self, now: Instant) -> Vec<ItemSnapshot> {
        self.giveups
            .iter()
            .map(|item| ItemSnapshot {
                ttl_remaining_ms: None,
                next_send_in_ms: None,
                ..self.project(item, now)
            })
            .collect()
    }

    fn project(&self, item: &QueueItem, now: Instant) -> ItemSnapshot {
        let age = item.age(now);
        ItemSnapshot {
            id: item.id,
            priority: item.priority,
            attempt: item.attempt,
            max_attempts: item.max_attempts,
            age_ms: millis(age),
            ttl_remaining_ms: self.effective_ttl(item).map(|ttl| millis(ttl.saturating_sub(age))),
            next_send_in_ms: item
                .next_eligible_at
                .map(|at| millis(at.saturating_duration_since(now))),
            last_error: item.last_error.clone(),
        }
    }

    fn effective_ttl(&self, item: &QueueItem) -> Option<Duration> {
        item.ttl_override.or_else(|| self.config.ttl())
    }

    fn is_expired(&self, item: &QueueItem, now: Instant) -> bool {
        self.effective_ttl(item)
            .is_some_and(|ttl| item.age(now) > ttl)
    }

    fn insert(&mut self, item: QueueItem) {
        let key = item.sort_key();
        let index = self.items.partition_point(|other| other.sort_key() < key);
        self.items.insert(index, item);
    }

    fn evict_oldest(&mut self) -> Option<ItemId> {
        let index = self
            .items
            .iter()
            .enumerate()
            .min_by_key(|(_, item)| (item.enqueued_at, item.id))
            .map(|(index, _)| index)?;
        let victim = self.items.remove(index);
        self.drop_item(victim.id, DropReason::Evicted);
        Some(victim.id)
    }

    fn drop_item(&mut self, id: ItemId, reason: DropReason) {
        self.stats.dropped += 1;
        self.events.push(QueueEvent::Dropped { id, reason });
    }

    fn expire(&mut self, item: QueueItem, now: Instant) {
        let age_ms = millis(item.age(now));
        debug!(id = %item.id, age_ms, "queued item expired");
        self.stats.expired += 1;
        self.events.push(QueueEvent::Expired { id: item.id, age_ms });
    }

    /// Records a failed send. Returns the id if the item is still queued.
    fn schedule_retry(&mut self, mut item: QueueItem, error: String, now: Instant) -> Option<ItemId> {
        item.attempt += 1;
        let id = item.id;
        let attempt = item.attempt;

        if attempt >= item.max_attempts {
            warn!(%id, attempt, %error, "giving up on queued item");
            self.stats.given_up += 1;
            self.events.push(QueueEvent::RetryGiveup {
                id,
                attempt,
                error: error.clone(),
            });
            item.last_error = Some(error);
            item.next_eligible_at = None;
            self.giveups.push(item);
            self.events.push(QueueEvent::GiveupStored {
                id,
                stored: self.giveups.len(),
            });
            return None;
        }

        let delay_ms = self.retry_delay_ms(attempt);
        debug!(%id, attempt, delay_ms, %error, "retry scheduled");
        item.next_eligible_at = Some(now + Duration::from_millis(delay_ms));
        item.last_error = Some(error);
        self.stats.retried += 1;
        self.events.push(QueueEvent::RetryScheduled {
            id,
            attempt,
            delay_ms,
        });
        self.insert(item);
        Some(id)
    }

    fn retry_delay_ms(&mut self, attempt: u32) -> u64 {
        if let Some(custom) = &self.custom_backoff {
            let value = custom(attempt);
            if value.is_finite() && value >= 0.0 {
                return value.round() as u64;
            }
        }
        backoff::calculate(attempt, &self.config.retry_policy(), &mut self.rng).jittered_ms
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
