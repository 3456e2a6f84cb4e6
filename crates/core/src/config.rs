// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection manager configuration.
//!
//! Configuration is usually read from TOML:
//!
//! ```toml
//! jitter_seed = 7
//!
//! [reconnect]
//! initial_delay_ms = 500
//! max_attempts = 12
//!
//! [queue]
//! max_size = 500
//! drop_strategy = "drop-oldest"
//! ttl_ms = 60000
//!
//! [timeouts]
//! connect_timeout_ms = 10000
//! ```
//!
//! Every field is optional; missing fields take the documented defaults.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::error::{Error, Result};

/// Top-level configuration for one connection manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Seed for jitter randomness. Unset means OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_seed: Option<u64>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Automatic reconnection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    /// Attempts before giving up. Unset means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// What to do when the outbound queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropStrategy {
    /// Evict the oldest unsent item to make room.
    #[default]
    DropOldest,
    /// Refuse the new item.
    DropNewest,
    /// Refuse the new item and report an error.
    Error,
}

/// Outbound queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_queue_max_size")]
    pub max_size: usize,
    #[serde(default)]
    pub drop_strategy: DropStrategy,
    /// Global time-to-live for queued items. 0 disables expiry.
    #[serde(default)]
    pub ttl_ms: u64,
    /// Send attempts per item before it is given up.
    #[serde(default = "default_max_send_retries")]
    pub max_send_retries: u32,
    #[serde(default = "default_retry_backoff_base_ms")]
    pub retry_backoff_base_ms: u64,
    #[serde(default = "default_multiplier")]
    pub retry_backoff_multiplier: f64,
    #[serde(default = "default_jitter_ratio")]
    pub retry_backoff_jitter_ratio: f64,
    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,
    /// Number of priority levels; 0 is the highest.
    #[serde(default = "default_priorities")]
    pub priorities: u8,
    /// Items processed per flush pass before yielding.
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
    /// Period of the expiry sweep when `ttl_ms` is positive.
    #[serde(default = "default_ttl_sweep_interval_ms")]
    pub ttl_sweep_interval_ms: u64,
}

/// Timeout settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Abort a connect attempt that has not resolved in time. Unset disables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

/// Metrics stream settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Also publish a metrics snapshot every window. Unset publishes on change only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_reconnect_initial_delay_ms() -> u64 {
    500
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter_ratio() -> f64 {
    0.2
}

fn default_queue_max_size() -> usize {
    500
}

fn default_max_send_retries() -> u32 {
    3
}

fn default_retry_backoff_base_ms() -> u64 {
    500
}

fn default_retry_backoff_max_ms() -> u64 {
    30_000
}

fn default_priorities() -> u8 {
    3
}

fn default_flush_batch_size() -> usize {
    50
}

fn default_ttl_sweep_interval_ms() -> u64 {
    1_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            enabled: true,
            initial_delay_ms: default_reconnect_initial_delay_ms(),
            max_delay_ms: default_reconnect_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_ratio: default_jitter_ratio(),
            max_attempts: None,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            enabled: true,
            max_size: default_queue_max_size(),
            drop_strategy: DropStrategy::default(),
            ttl_ms: 0,
            max_send_retries: default_max_send_retries(),
            retry_backoff_base_ms: default_retry_backoff_base_ms(),
            retry_backoff_multiplier: default_multiplier(),
            retry_backoff_jitter_ratio: default_jitter_ratio(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
            priorities: default_priorities(),
            flush_batch_size: default_flush_batch_size(),
            ttl_sweep_interval_ms: default_ttl_sweep_interval_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay_ms: self.initial_delay_ms,
            max_delay_ms: self.max_delay_ms,
            multiplier: self.multiplier,
            jitter_ratio: self.jitter_ratio,
        }
    }
}

impl QueueConfig {
    pub fn retry_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay_ms: self.retry_backoff_base_ms,
            max_delay_ms: self.retry_backoff_max_ms,
            multiplier: self.retry_backoff_multiplier,
            jitter_ratio: self.retry_backoff_jitter_ratio,
        }
    }

    /// Global TTL, if expiry is enabled.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms))
    }

    /// Priority used when the caller does not choose one: the middle level.
    pub fn default_priority(&self) -> u8 {
        self.priorities.saturating_sub(1) / 2
    }
}

impl TimeoutConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

impl MetricsConfig {
    pub fn window(&self) -> Option<Duration> {
        self.window_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl ManagerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ManagerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values that would break backoff or queue invariants.
    pub fn validate(&self) -> Result<()> {
        validate_policy("reconnect", &self.reconnect.policy())?;
        validate_policy("queue.retry_backoff", &self.queue.retry_policy())?;

        if self.reconnect.max_attempts == Some(0) {
            return Err(Error::invalid_config(
                "reconnect.max_attempts",
                "must be at least 1 when set",
            ));
        }
        if self.queue.max_size == 0 {
            return Err(Error::invalid_config("queue.max_size", "must be at least 1"));
        }
        if self.queue.max_send_retries == 0 {
            return Err(Error::invalid_config(
                "queue.max_send_retries",
                "must be at least 1",
            ));
        }
        if self.queue.priorities == 0 {
            return Err(Error::invalid_config("queue.priorities", "must be at least 1"));
        }
        if self.queue.flush_batch_size == 0 {
            return Err(Error::invalid_config(
                "queue.flush_batch_size",
                "must be at least 1",
            ));
        }
        if self.queue.ttl_ms > 0 && self.queue.ttl_sweep_interval_ms == 0 {
            return Err(Error::invalid_config(
                "queue.ttl_sweep_interval_ms",
                "must be positive when ttl_ms is set",
            ));
        }
        Ok(())
    }
}

fn validate_policy(section: &'static str, policy: &BackoffPolicy) -> Result<()> {
    if policy.multiplier.is_nan() || policy.multiplier < 1.0 {
        return Err(Error::invalid_config(
            section,
            format!("multiplier must be >= 1 (got {})", policy.multiplier),
        ));
    }
    if !(0.0..=1.0).contains(&policy.jitter_ratio) {
        return Err(Error::invalid_config(
            section,
            format!("jitter ratio must be within 0..=1 (got {})", policy.jitter_ratio),
        ));
    }
    if policy.initial_delay_ms > policy.max_delay_ms {
        return Err(Error::invalid_config(
            section,
            format!(
                "initial delay {}ms exceeds max delay {}ms",
                policy.initial_delay_ms, policy.max_delay_ms
            ),
        ));
    }
    Ok(())
}

impl DropStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropStrategy::DropOldest => "drop-oldest",
            DropStrategy::DropNewest => "drop-newest",
            DropStrategy::Error => "error",
        }
    }
}

impl fmt::Display for DropStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DropStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "drop-oldest" => Ok(DropStrategy::DropOldest),
            "drop-newest" => Ok(DropStrategy::DropNewest),
            "error" => Ok(DropStrategy::Error),
            other => Err(Error::InvalidDropStrategy(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
