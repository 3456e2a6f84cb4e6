// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff with jitter.
//!
//! Used for both reconnection scheduling and per-item send retries.
//!
//! ```text
//! planned  = min(max_delay, initial_delay * multiplier^(attempt - 1))
//! band     = planned * jitter_ratio
//! jittered = uniform(planned - band/2, planned + band/2), floored at 0
//! ```

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Shape of a backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay for the first attempt (milliseconds).
    pub initial_delay_ms: u64,
    /// Ceiling for the planned delay (milliseconds).
    pub max_delay_ms: u64,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Width of the jitter band relative to the planned delay.
    pub jitter_ratio: f64,
}

/// Result of a backoff calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffDelay {
    /// Delay before jitter is applied.
    pub planned_ms: u64,
    /// Delay actually used.
    pub jittered_ms: u64,
}

impl BackoffDelay {
    pub fn planned(&self) -> Duration {
        Duration::from_millis(self.planned_ms)
    }

    pub fn jittered(&self) -> Duration {
        Duration::from_millis(self.jittered_ms)
    }
}

/// Returns the un-jittered delay for a 1-based attempt number.
///
/// Attempt 0 is treated as attempt 1.
pub fn planned_delay_ms(attempt: u32, policy: &BackoffPolicy) -> u64 {
    let exponent = attempt.saturating_sub(1);
    let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
    let raw = policy.initial_delay_ms as f64 * policy.multiplier.powi(exponent);
    let cap = policy.max_delay_ms as f64;
    if !raw.is_finite() || raw >= cap {
        policy.max_delay_ms
    } else {
        raw.max(0.0).round() as u64
    }
}

/// Calculates the planned and jittered delay for `attempt`.
pub fn calculate<R: Rng + ?Sized>(attempt: u32, policy: &BackoffPolicy, rng: &mut R) -> BackoffDelay {
    let planned_ms = planned_delay_ms(attempt, policy);

    if policy.jitter_ratio.is_nan() || policy.jitter_ratio <= 0.0 || planned_ms == 0 {
        return BackoffDelay {
            planned_ms,
            jittered_ms: planned_ms,
        };
    }

    let half_band = planned_ms as f64 * policy.jitter_ratio / 2.0;
    let offset = rng.gen_range(-half_band..=half_band);
    let jittered_ms = (planned_ms as f64 + offset).max(0.0).round() as u64;

    BackoffDelay {
        planned_ms,
        jittered_ms,
    }
}

/// A backoff policy paired with its own random source.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    rng: StdRng,
}

impl Backoff {
    /// Creates a backoff seeded from OS entropy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Backoff {
            policy,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a backoff with a fixed seed so jitter is reproducible.
    pub fn seeded(policy: BackoffPolicy, seed: u64) -> Self {
        Backoff {
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a seeded backoff when `seed` is set, an entropy-seeded one otherwise.
    pub fn with_seed(policy: BackoffPolicy, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Backoff::seeded(policy, seed),
            None => Backoff::new(policy),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Delay for the given 1-based attempt.
    pub fn delay(&mut self, attempt: u32) -> BackoffDelay {
        calculate(attempt, &self.policy, &mut self.rng)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
