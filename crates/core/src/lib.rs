// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether-core: Runtime-free building blocks for the tether connection manager
//!
//! This crate provides the backoff calculator, outbound queue, metrics sink,
//! configuration and event types shared by the `tether` client and tooling.
//! Nothing here spawns tasks or reads a clock on its own.

pub mod backoff;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod metrics;
pub mod queue;

pub use backoff::{Backoff, BackoffDelay, BackoffPolicy};
pub use config::{DropStrategy, ManagerConfig, MetricsConfig, QueueConfig, ReconnectConfig, TimeoutConfig};
pub use envelope::{Credentials, Envelope};
pub use error::{Error, Result};
pub use events::{ConnectionState, DropReason, ErrorEvent, ErrorKind, ItemId, QueueEvent, StateChange};
pub use metrics::{Counter, HealthMetrics, MetricsSink, ResetOptions};
pub use queue::{
    EnqueueOptions, EnqueueOutcome, FlushReport, ItemSnapshot, OutboundQueue, QueueError, QueueStats,
    RetryBackoffFn,
};
