//! Circuit breaker for a named protected operation.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: operation assumed down, calls are short-circuited to the fallback
//! - Half-Open: a limited number of trial calls probe for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure rate >= threshold over the sliding window (after minimum calls)
//! Open → Half-Open: after the open-state wait duration, on the next call
//! Half-Open → Closed: a trial call succeeds
//! Half-Open → Open: a trial call fails
//! ```
//!
//! Each transition starts a new generation. A `Permit` remembers the generation
//! it was granted in, and outcomes reported with a permit from an earlier
//! generation are ignored.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    // true = failed call; oldest first
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_in_flight: usize,
    generation: u64,
}

/// Admission granted by `try_acquire`, tied to the state it was granted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a granted call must be settled with on_success, on_failure or release"]
pub struct Permit {
    generation: u64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                outcomes: VecDeque::with_capacity(config.sliding_window_size),
                opened_at: None,
                half_open_in_flight: 0,
                generation: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Asks permission for one call. Every granted call must end in
    /// `on_success`, `on_failure` or `release`.
    pub fn try_acquire(&self) -> Option<Permit> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Option<Permit> {
        let mut inner = self.lock();
        let granted = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = inner.opened_at.is_none_or(|opened| {
                    now.saturating_duration_since(opened) >= self.config.wait_duration_in_open_state
                });
                if cooled_down {
                    self.transition(&mut inner, CircuitState::HalfOpen, now);
                    inner.half_open_in_flight = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.permitted_calls_in_half_open_state {
                    inner.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        };
        granted.then_some(Permit {
            generation: inner.generation,
        })
    }

    pub fn on_success(&self, permit: Permit) {
        let now = Instant::now();
        let mut inner = self.lock();
        if is_stale(&inner, permit) {
            return;
        }
        match inner.state {
            CircuitState::Closed => self.record(&mut inner, false, now),
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Closed, now),
            CircuitState::Open => {}
        }
    }

    pub fn on_failure(&self, permit: Permit) {
        self.on_failure_at(permit, Instant::now());
    }

    pub fn on_failure_at(&self, permit: Permit, now: Instant) {
        let mut inner = self.lock();
        if is_stale(&inner, permit) {
            return;
        }
        match inner.state {
            CircuitState::Closed => self.record(&mut inner, true, now),
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open, now),
            CircuitState::Open => {}
        }
    }

    /// A granted call finished without an outcome that counts (terminal error or cancellation).
    pub fn release(&self, permit: Permit) {
        let mut inner = self.lock();
        if !is_stale(&inner, permit) && inner.state == CircuitState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    fn record(&self, inner: &mut BreakerInner, failed: bool, now: Instant) {
        if inner.outcomes.len() == self.config.sliding_window_size {
            inner.outcomes.pop_front();
        }
        inner.outcomes.push_back(failed);

        let calls = inner.outcomes.len();
        if calls < self.config.minimum_number_of_calls {
            return;
        }

        let failures = inner.outcomes.iter().filter(|f| **f).count();
        if failures * 100 >= usize::from(self.config.failure_rate_threshold) * calls {
            tracing::warn!(
                breaker = %self.name,
                failures,
                calls,
                "failure rate threshold exceeded"
            );
            self.transition(inner, CircuitState::Open, now);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.half_open_in_flight = 0;
        match to {
            CircuitState::Open => inner.opened_at = Some(now),
            CircuitState::Closed => {
                inner.outcomes.clear();
                inner.opened_at = None;
            }
            CircuitState::HalfOpen => {}
        }
        tracing::warn!(breaker = %self.name, ?from, ?to, "circuit breaker state transition");
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Granted before the latest transition; the call was admitted under a state that no longer holds.
fn is_stale(inner: &BreakerInner, permit: Permit) -> bool {
    permit.generation != inner.generation
}
