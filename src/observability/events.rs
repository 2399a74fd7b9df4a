//! Structured resilience events and the sink that receives them.

use std::time::Duration;

use crate::observability::metrics;

/// Outcome of one attempt, handed to the sink and then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub target: String,
    /// 1-based attempt number within the call.
    pub attempt: u32,
    pub succeeded: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Everything a pipeline reports while executing calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ResilienceEvent {
    /// An attempt finished (successfully or not).
    Attempt(AttemptRecord),
    /// Attempt `attempt` failed transiently; the next one starts after `delay`.
    RetryAttempt {
        target: String,
        attempt: u32,
        delay: Duration,
        error_message: String,
    },
    /// The circuit opened and will reject calls for `duration`.
    CircuitOpened {
        target: String,
        duration: Duration,
        error_message: String,
    },
    /// The break elapsed and a trial call was admitted.
    CircuitHalfOpen { target: String },
    /// The circuit closed again.
    CircuitReset { target: String },
    /// A call was short-circuited without invoking the action.
    CallRejected { target: String, retry_after: Duration },
}

impl ResilienceEvent {
    pub fn target(&self) -> &str {
        match self {
            ResilienceEvent::Attempt(record) => &record.target,
            ResilienceEvent::RetryAttempt { target, .. }
            | ResilienceEvent::CircuitOpened { target, .. }
            | ResilienceEvent::CircuitHalfOpen { target }
            | ResilienceEvent::CircuitReset { target }
            | ResilienceEvent::CallRejected { target, .. } => target,
        }
    }
}

/// Receiver of resilience events.
///
/// Implementations must return quickly and never fail; the pipeline calls
/// `emit` inline on the caller's task.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ResilienceEvent);
}

/// Default sink: structured `tracing` logs plus `metrics` updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &ResilienceEvent) {
        match event {
            ResilienceEvent::Attempt(record) => {
                if record.succeeded {
                    tracing::debug!(
                        target_name = %record.target,
                        attempt = record.attempt,
                        elapsed_ms = record.elapsed.as_millis() as u64,
                        "Attempt succeeded"
                    );
                } else {
                    tracing::debug!(
                        target_name = %record.target,
                        attempt = record.attempt,
                        elapsed_ms = record.elapsed.as_millis() as u64,
                        error = record.error.as_deref().unwrap_or(""),
                        "Attempt failed"
                    );
                }
                metrics::record_attempt(&record.target, record.succeeded, record.elapsed);
            }
            ResilienceEvent::RetryAttempt {
                target,
                attempt,
                delay,
                error_message,
            } => {
                tracing::warn!(
                    target_name = %target,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error_message,
                    "Attempt failed, retrying"
                );
                metrics::record_retry(target);
            }
            ResilienceEvent::CircuitOpened {
                target,
                duration,
                error_message,
            } => {
                tracing::warn!(
                    target_name = %target,
                    break_secs = duration.as_secs(),
                    error = %error_message,
                    "Circuit opened"
                );
                metrics::record_circuit_transition(target, metrics::CircuitGauge::Open);
            }
            ResilienceEvent::CircuitHalfOpen { target } => {
                tracing::info!(target_name = %target, "Circuit half-open, admitting trial");
                metrics::record_circuit_transition(target, metrics::CircuitGauge::HalfOpen);
            }
            ResilienceEvent::CircuitReset { target } => {
                tracing::info!(target_name = %target, "Circuit closed");
                metrics::record_circuit_transition(target, metrics::CircuitGauge::Closed);
            }
            ResilienceEvent::CallRejected { target, retry_after } => {
                tracing::debug!(
                    target_name = %target,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Circuit open, call rejected"
                );
                metrics::record_rejection(target);
            }
        }
    }
}
