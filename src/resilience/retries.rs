//! Retry logic.
//!
//! # Responsibilities
//! - Run the action up to `max_retries + 1` times, each attempt time-boxed
//! - Decide retryability from the error's classification
//! - Wait with exponential backoff (+ optional jitter) between attempts
//! - Report every attempt and every scheduled retry to the event sink
//! - Count every failed attempt against the circuit breaker
//!
//! # Design Decisions
//! - Non-transient errors abort on first occurrence
//! - Timeouts are transient
//! - No retry is scheduled once the breaker has opened under the call
//! - Cancellation is checked before each attempt and raced against both the
//!   attempt and the backoff sleep; the in-flight action is dropped

use std::fmt;
use std::future::Future;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::observability::{AttemptRecord, EventSink, ResilienceEvent};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::CallPermit;
use crate::resilience::timeouts::with_timeout;
use crate::resilience::{AttemptError, Classify, PolicyConfig, ResilienceError};

/// Execute `action` with retries.
///
/// Failed attempts are reported to `permit` when one is given; admission
/// and the final success are left to the caller.
pub async fn run_with_retries<F, Fut, T, E>(
    target: &str,
    policy: &PolicyConfig,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
    mut permit: Option<&mut CallPermit<'_>>,
    mut action: F,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(target, attempt));
        }

        attempt += 1;
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(attempt, "Call cancelled during attempt");
                return Err(cancelled(target, attempt));
            }
            outcome = with_timeout(policy.timeout, action()) => outcome,
        };

        sink.emit(&ResilienceEvent::Attempt(AttemptRecord {
            target: target.to_string(),
            attempt,
            succeeded: outcome.is_ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
            elapsed: started.elapsed(),
        }));

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let circuit = match permit.as_mut() {
            Some(permit) => permit.record_attempt_failure(&err.to_string()),
            None => Ok(()),
        };

        let err = match err {
            AttemptError::Failed(error) if !error.is_transient() => {
                tracing::warn!(attempt, error = %error, "Error is not retryable, failing immediately");
                return Err(ResilienceError::NonTransient {
                    target: target.to_string(),
                    attempts: attempt,
                    error,
                });
            }
            err => err,
        };

        if attempt >= max_attempts {
            tracing::error!(attempt, error = %err, "Call failed after max retries");
            return Err(ResilienceError::RetriesExhausted {
                target: target.to_string(),
                attempts: attempt,
                last: err,
            });
        }

        if let Err(retry_after) = circuit {
            tracing::warn!(attempt, error = %err, "Circuit opened, abandoning remaining retries");
            return Err(ResilienceError::CircuitOpen {
                target: target.to_string(),
                retry_after,
            });
        }

        let delay = calculate_backoff(attempt, policy);
        sink.emit(&ResilienceEvent::RetryAttempt {
            target: target.to_string(),
            attempt,
            delay,
            error_message: err.to_string(),
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(attempt, "Call cancelled during backoff");
                return Err(cancelled(target, attempt));
            }
            _ = sleep(delay) => {}
        }
    }
}

fn cancelled<E>(target: &str, attempts: u32) -> ResilienceError<E> {
    ResilienceError::Cancelled {
        target: target.to_string(),
        attempts,
    }
}
