//! Circuit breaker state machine: CLOSED -> OPEN -> HALF_OPEN -> CLOSED
//! (spec.md §4.2, §8). One breaker guards one call site; state is behind a
//! single lock since contention at any one breaker is rare (spec.md §5).

use crate::domain::errors::CircuitOpenError;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

/// Trips open after `failure_threshold` consecutive failures; after
/// `recovery_timeout` it allows probe calls in HALF_OPEN; `half_open_max_successes`
/// consecutive probe successes close it again. Any half-open failure reopens
/// immediately.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_max_successes: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        half_open_max_successes: u32,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            recovery_timeout,
            half_open_max_successes,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Returns `Err` without invoking anything if the breaker is open and the
    /// recovery timeout has not elapsed; otherwise runs `f` and records the
    /// outcome.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.admit()?;

        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(CallError::Inner(err))
            }
        }
    }

    fn admit(&self) -> Result<(), CallError<std::convert::Infallible>> {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            State::Closed => Ok(()),
            State::HalfOpen => Ok(()),
            State::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.recovery_timeout {
                    debug!(breaker = %self.name, "transitioning to half-open for probe");
                    inner.state = State::HalfOpen;
                    inner.half_open_successes = 0;
                    Ok(())
                } else {
                    Err(CallError::Open(CircuitOpenError {
                        name: self.name.clone(),
                    }))
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            State::Closed => {
                inner.consecutive_failures = 0;
            }
            State::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.half_open_max_successes {
                    debug!(breaker = %self.name, "closing after successful half-open probes");
                    inner.state = State::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                }
            }
            State::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(breaker = %self.name, "opening after repeated failures");
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                warn!(breaker = %self.name, "half-open probe failed, reopening");
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_successes = 0;
            }
            State::Open => {}
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().expect("circuit breaker mutex poisoned").state == State::Open
    }
}

#[derive(Debug)]
pub enum CallError<E> {
    Open(CircuitOpenError),
    Inner(E),
}
