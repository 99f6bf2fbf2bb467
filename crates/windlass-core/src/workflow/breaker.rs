//! Per-step circuit breaker state machine.
//!
//! Closed -> Open after `failure_threshold` consecutive failures; Open ->
//! HalfOpen once `timeout_ms` has elapsed; HalfOpen admits up to
//! `half_open_max_calls` probes and closes again after `success_threshold`
//! successes. Any half-open failure reopens the circuit. The driver keys one
//! breaker per (workflow, step) and consults it before every attempt.

use std::time::{Duration, Instant};

use windlass_types::workflow::CircuitBreakerConfig;

/// Circuit state for one (workflow, step) pair.
#[derive(Debug, Clone)]
enum CircuitState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { probes: u32, successes: u32 },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed {
                consecutive_failures: 0,
            },
        }
    }

    /// Whether an attempt may proceed. Advances Open -> HalfOpen when the
    /// open window has elapsed and counts half-open probes.
    pub fn try_acquire(&mut self) -> bool {
        match &mut self.state {
            CircuitState::Closed { .. } => true,
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= Duration::from_millis(self.config.timeout_ms) {
                    tracing::debug!("circuit half-open, admitting probe");
                    self.state = CircuitState::HalfOpen {
                        probes: 1,
                        successes: 0,
                    };
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen { probes, .. } => {
                if *probes < self.config.half_open_max_calls {
                    *probes += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        match &mut self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => *consecutive_failures = 0,
            CircuitState::HalfOpen { successes, .. } => {
                *successes += 1;
                if *successes >= self.config.success_threshold {
                    tracing::debug!("circuit closed after half-open successes");
                    self.state = CircuitState::Closed {
                        consecutive_failures: 0,
                    };
                }
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub fn record_failure(&mut self) {
        match &mut self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => {
                *consecutive_failures += 1;
                if *consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = *consecutive_failures,
                        "circuit opened after consecutive failures"
                    );
                    self.state = CircuitState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            CircuitState::HalfOpen { .. } => {
                tracing::warn!("circuit reopened after half-open failure");
                self.state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
            }
            CircuitState::Open { .. } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
