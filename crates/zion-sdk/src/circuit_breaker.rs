//! Circuit breaker guarding transaction broadcast.
//!
//! States:
//! - Closed: broadcasts pass through
//! - Open: failures reached the threshold, broadcasts fail fast
//! - HalfOpen: open timeout elapsed, one trial broadcast at a time
//!
//! The whole state sits behind one mutex so that concurrent failures are
//! counted exactly once and transitions never interleave.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Successes in half-open needed to close the circuit.
    pub success_threshold: u32,
    /// How long the circuit stays open before allowing a trial call.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            config,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // State stays consistent even if a holder panicked; every update is
        // a handful of field writes.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a call may go through right now. Moves Open to HalfOpen once
    /// the open timeout has elapsed.
    pub fn can_execute(&self) -> bool {
        self.admit(false)
    }

    /// Like [`Self::can_execute`], but in HalfOpen also claims the single
    /// trial slot until the outcome is recorded.
    fn admit(&self, claim: bool) -> bool {
        let mut inner = self.lock();
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .is_some_and(|t| t.elapsed() >= self.config.open_timeout);
            if !elapsed {
                return false;
            }
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            inner.trial_in_flight = false;
            log::info!("broadcast circuit breaker half-open");
        }
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen if inner.trial_in_flight => false,
            CircuitState::HalfOpen => {
                inner.trial_in_flight = claim;
                true
            }
            CircuitState::Open => false,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.trial_in_flight = false;
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.opened_at = None;
                    log::info!("broadcast circuit breaker closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.trial_in_flight = false;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    log::warn!(
                        "broadcast circuit breaker open after {} consecutive failures",
                        inner.failure_count
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                log::warn!("broadcast circuit breaker re-opened, trial call failed");
            }
            CircuitState::Open => inner.opened_at = Some(Instant::now()),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Run `operation` under the breaker, failing fast with
    /// [`Error::CircuitOpen`] while open or while a half-open trial is running.
    pub fn call<T>(&self, operation: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.admit(true) {
            return Err(Error::CircuitOpen);
        }
        match operation() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
