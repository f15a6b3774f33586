// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Exponential backoff for failed reconciliations.
//!
//! The controller's error policy asks [`ErrorBackoff::next_delay`] how long to wait before
//! retrying an object; a successful pass calls [`ErrorBackoff::reset`] for that object.
//!
//! # Schedule
//!
//! With the default 5 second base and 5 minute cap, consecutive failures of one object
//! are retried after roughly 5s, 10s, 20s, 40s, 80s, 160s, then every 300s.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Per-object exponential backoff with jitter.
#[derive(Debug)]
pub struct ErrorBackoff {
    base: Duration,
    max: Duration,
    randomization_factor: f64,
    failures: Mutex<HashMap<String, u32>>,
}

impl ErrorBackoff {
    /// Create a backoff growing from `base` up to `max`.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            randomization_factor: RANDOMIZATION_FACTOR,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Same as [`ErrorBackoff::new`] without jitter, for deterministic schedules.
    #[must_use]
    pub fn without_jitter(base: Duration, max: Duration) -> Self {
        Self {
            randomization_factor: 0.0,
            ..Self::new(base, max)
        }
    }

    /// Record a failure of `key` and return the delay before its next attempt.
    pub fn next_delay(&self, key: &str) -> Duration {
        let attempt = {
            let mut failures = self
                .failures
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let count = failures.entry(key.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        self.apply_jitter(self.delay_for_attempt(attempt))
    }

    /// Forget the failures of `key` after a successful pass.
    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    /// Keep only the keys accepted by `keep`, returning how many were dropped.
    pub fn retain(&self, keep: impl Fn(&str) -> bool) -> usize {
        let mut failures = self
            .failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = failures.len();
        failures.retain(|key, _| keep(key));
        before - failures.len()
    }

    /// Consecutive failures currently recorded for `key`.
    #[must_use]
    pub fn failures(&self, key: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Un-jittered delay of the `attempt`-th consecutive failure (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base.as_secs_f64() * BACKOFF_MULTIPLIER.powi(exponent);
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(secs)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        // random() is uniform in [0, 1); map it onto [-factor, +factor]
        let spread = (rand::random::<f64>() * 2.0 - 1.0) * self.randomization_factor;
        let jittered = interval.as_secs_f64() * (1.0 + spread);
        Duration::from_secs_f64(jittered.max(0.0)).min(self.max)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod backoff_tests;
