//! Three-state circuit breaker guarding calls into the decision engine and
//! the healer.
//!
//! ```text
//! CLOSED --N consecutive failures--> OPEN --reset timeout--> HALF_OPEN
//!   ^                                 ^                         |
//!   +------ M trial successes --------+---- any trial failure --+
//! ```

use crate::config::BreakerConfig;
use crate::error::{IdsError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            half_open_in_flight: 0,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
        }
    }

    fn trip(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.consecutive_successes = 0;
        self.half_open_in_flight = 0;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.half_open_in_flight = 0;
    }
}

/// One granted call. Consume it with `success` or `failure`; dropping it
/// unfinished (a cancelled future, a panic) hands a half-open trial slot
/// back without counting either way.
#[must_use]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl BreakerPermit<'_> {
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.trial);
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    cfg: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, cfg: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            cfg,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// OPEN becomes HALF_OPEN once the reset timeout has elapsed.
    fn refresh(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner
            .opened_at
            .map(|t| t.elapsed() >= self.cfg.reset_timeout())
            .unwrap_or(true);
        if elapsed {
            inner.state = CircuitState::HalfOpen;
            inner.consecutive_successes = 0;
            inner.half_open_in_flight = 0;
            tracing::debug!(breaker = %self.name, "circuit half-open");
        }
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Some(true) when the granted call is a half-open trial.
    fn acquire(&self) -> Option<bool> {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match inner.state {
            CircuitState::Closed => Some(false),
            CircuitState::HalfOpen if inner.half_open_in_flight < self.cfg.half_open_max_calls => {
                inner.half_open_in_flight += 1;
                Some(true)
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                inner.total_rejections += 1;
                None
            }
        }
    }

    /// Ask permission for one call. Every granted call must be followed by
    /// exactly one `record_success` or `record_failure`.
    pub fn try_acquire(&self) -> bool {
        self.acquire().is_some()
    }

    /// `try_acquire` as a guard that cannot leak a half-open slot.
    pub fn permit(&self) -> Option<BreakerPermit<'_>> {
        self.acquire().map(|trial| BreakerPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn release(&self, trial: bool) {
        let mut inner = self.lock();
        if trial && inner.state == CircuitState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
            tracing::debug!(breaker = %self.name, "abandoned trial call released");
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_successes += 1;
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.cfg.success_threshold {
                    inner.close();
                    tracing::info!(breaker = %self.name, "circuit closed");
                }
            }
            // A straggler finishing after the circuit opened changes nothing.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.total_failures += 1;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.cfg.failure_threshold {
                    inner.trip();
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_failures += 1;
                inner.trip();
                tracing::warn!(breaker = %self.name, "trial call failed; circuit re-opened");
            }
            CircuitState::Open => {}
        }
    }

    /// Run `f` through the breaker. Short-circuits with `CircuitOpen`.
    pub fn call<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let permit = self
            .permit()
            .ok_or_else(|| IdsError::CircuitOpen(self.name.clone()))?;
        let out = f();
        match &out {
            Ok(_) => permit.success(),
            Err(_) => permit.failure(),
        }
        out
    }

    pub fn stats(&self) -> BreakerStats {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
        }
    }

    pub fn reset(&self) {
        self.lock().close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
