//! Backoff scheduling for retried steps and agent tools.
//!
//! The same schedule rule applies everywhere a retry happens: `linear` and
//! `fixed` hold the delay constant at `initial_delay_ms`; `exponential`
//! doubles the delay after each attempt, capped at `max_delay_ms`. Callers
//! sleep for `next_delay()` before every attempt.

use std::time::Duration;

use windlass_types::workflow::{BackoffStrategy, RetryConfig};

/// Mutable backoff schedule for one retry sequence.
#[derive(Debug)]
pub struct BackoffSchedule {
    next_ms: u64,
    max_ms: u64,
    strategy: BackoffStrategy,
}

impl BackoffSchedule {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next_ms: config.initial_delay_ms,
            max_ms: config.max_delay_ms,
            strategy: config.backoff,
        }
    }

    /// The delay to sleep before the next attempt. Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next_ms;
        if self.strategy == BackoffStrategy::Exponential {
            self.next_ms = current.saturating_mul(2).min(self.max_ms);
        }
        Duration::from_millis(current)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
