//! Circuit breaker for target protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: target assumed down, calls fail fast
//! - Half-Open: one trial call tests whether the target recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failed attempts >= failure_threshold
//! Open → Half-Open: break_duration elapsed (checked on the next call)
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: any trial attempt fails
//! ```
//!
//! # Design Decisions
//! - One breaker per target, owned by its pipeline
//! - Fail fast in Open state (no waiting for timeout)
//! - Single trial in Half-Open; concurrent callers are rejected as if Open
//! - Failures are counted per attempt, so one call can open the circuit
//! - Outcomes of calls admitted under an earlier state leave the state alone
//! - Events are emitted after the state lock is released

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::observability::{EventSink, ResilienceEvent};

/// Breaker status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time copy of the breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    /// Set only while `status` is `Open`.
    pub opened_at: Option<Instant>,
    pub trial_in_flight: bool,
}

#[derive(Debug)]
struct BreakerState {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn open(&mut self, now: Instant) {
        self.status = CircuitStatus::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
    }

    fn close(&mut self) {
        self.status = CircuitStatus::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
    }
}

/// Consecutive-failure circuit breaker with exclusive half-open probing.
pub struct CircuitBreaker {
    target: String,
    failure_threshold: u32,
    break_duration: Duration,
    state: Mutex<BreakerState>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("target", &self.target)
            .field("failure_threshold", &self.failure_threshold)
            .field("break_duration", &self.break_duration)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(
        target: impl Into<String>,
        failure_threshold: u32,
        break_duration: Duration,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            target: target.into(),
            failure_threshold: failure_threshold.max(1),
            break_duration,
            state: Mutex::new(BreakerState {
                status: CircuitStatus::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            sink,
        }
    }

    /// Current status.
    ///
    /// An Open breaker whose break has elapsed still reports `Open` until the
    /// next call is admitted as a trial.
    pub fn status(&self) -> CircuitStatus {
        self.state.lock().status
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock();
        BreakerSnapshot {
            status: state.status,
            consecutive_failures: state.consecutive_failures,
            opened_at: state.opened_at,
            trial_in_flight: state.trial_in_flight,
        }
    }

    /// Ask to run a call.
    ///
    /// Returns a permit that must be settled with the call's outcome, or the
    /// time left until a trial may be admitted.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, Duration> {
        let mut transition = None;

        let decision = {
            let mut state = self.state.lock();
            match state.status {
                CircuitStatus::Closed => Ok(false),
                CircuitStatus::Open => {
                    let elapsed = state
                        .opened_at
                        .map_or(self.break_duration, |opened| opened.elapsed());

                    if elapsed >= self.break_duration {
                        state.status = CircuitStatus::HalfOpen;
                        state.opened_at = None;
                        state.trial_in_flight = true;
                        transition = Some(ResilienceEvent::CircuitHalfOpen {
                            target: self.target.clone(),
                        });
                        Ok(true)
                    } else {
                        Err(self.break_duration - elapsed)
                    }
                }
                CircuitStatus::HalfOpen => {
                    if state.trial_in_flight {
                        Err(Duration::ZERO)
                    } else {
                        state.trial_in_flight = true;
                        Ok(true)
                    }
                }
            }
        };

        if let Some(event) = transition {
            self.sink.emit(&event);
        }

        match decision {
            Ok(trial) => Ok(CallPermit {
                breaker: self,
                trial,
                settled: false,
            }),
            Err(retry_after) => {
                self.sink.emit(&ResilienceEvent::CallRejected {
                    target: self.target.clone(),
                    retry_after,
                });
                Err(retry_after)
            }
        }
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        let was_closed = {
            let mut state = self.state.lock();
            let was_closed = state.status == CircuitStatus::Closed;
            state.close();
            was_closed
        };

        tracing::info!(target_name = %self.target, "Circuit breaker manually reset");
        if !was_closed {
            self.sink.emit(&ResilienceEvent::CircuitReset {
                target: self.target.clone(),
            });
        }
    }

    fn on_success(&self, trial: bool) {
        let reset = {
            let mut state = self.state.lock();
            match (state.status, trial) {
                (CircuitStatus::HalfOpen, true) => {
                    state.close();
                    true
                }
                (CircuitStatus::Closed, false) => {
                    state.consecutive_failures = 0;
                    false
                }
                _ => false,
            }
        };

        if reset {
            self.sink.emit(&ResilienceEvent::CircuitReset {
                target: self.target.clone(),
            });
        }
    }

    fn on_attempt_failure(&self, trial: bool, error_message: &str) -> Result<(), Duration> {
        let (verdict, opened) = {
            let mut state = self.state.lock();
            match (state.status, trial) {
                (CircuitStatus::Closed, false) => {
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    if state.consecutive_failures >= self.failure_threshold {
                        state.open(Instant::now());
                        (Err(self.break_duration), true)
                    } else {
                        (Ok(()), false)
                    }
                }
                (CircuitStatus::HalfOpen, true) => {
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    state.open(Instant::now());
                    (Err(self.break_duration), true)
                }
                (CircuitStatus::Open, _) => {
                    let remaining = state.opened_at.map_or(Duration::ZERO, |opened| {
                        self.break_duration.saturating_sub(opened.elapsed())
                    });
                    (Err(remaining), false)
                }
                // Closed-era call finishing during another call's trial.
                (CircuitStatus::HalfOpen, false) => (Err(Duration::ZERO), false),
                // Trial outliving a manual reset.
                (CircuitStatus::Closed, true) => (Ok(()), false),
            }
        };

        if opened {
            self.sink.emit(&ResilienceEvent::CircuitOpened {
                target: self.target.clone(),
                duration: self.break_duration,
                error_message: error_message.to_string(),
            });
        }

        verdict
    }

    fn release_trial(&self) {
        let mut state = self.state.lock();
        if state.status == CircuitStatus::HalfOpen {
            state.trial_in_flight = false;
        }
    }
}

/// Admission ticket for one call.
///
/// Every failed attempt is reported through
/// [`record_attempt_failure`](Self::record_attempt_failure); a successful call
/// ends with [`record_success`](Self::record_success). Dropping a trial permit
/// that never reported anything (e.g. on cancellation) frees the trial slot
/// without changing the breaker state.
#[must_use = "a permit must be settled with the call outcome"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    /// Whether this call is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    /// Count one failed attempt.
    ///
    /// Returns `Err(retry_after)` once the circuit is no longer closed for
    /// this call; the caller must not start another attempt.
    pub fn record_attempt_failure(&mut self, error_message: &str) -> Result<(), Duration> {
        if self.trial {
            self.settled = true;
        }
        self.breaker.on_attempt_failure(self.trial, error_message)
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}
