//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define resilience metrics (attempts, retries, breaker state, rejections)
//! - Expose a Prometheus-compatible metrics endpoint when enabled
//! - Track per-target metrics
//!
//! # Metrics
//! - `resilience_attempts_total` (counter): attempts by target, outcome
//! - `resilience_attempt_duration_seconds` (histogram): attempt latency
//! - `resilience_retries_total` (counter): retries scheduled by target
//! - `resilience_circuit_transitions_total` (counter): transitions by target, state
//! - `resilience_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `resilience_rejected_calls_total` (counter): short-circuited calls
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are limited to target name and outcome/state

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

/// Breaker state as exported on the `resilience_circuit_state` gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitGauge {
    Closed,
    HalfOpen,
    Open,
}

impl CircuitGauge {
    fn value(self) -> f64 {
        match self {
            CircuitGauge::Closed => 0.0,
            CircuitGauge::HalfOpen => 1.0,
            CircuitGauge::Open => 2.0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CircuitGauge::Closed => "closed",
            CircuitGauge::HalfOpen => "half_open",
            CircuitGauge::Open => "open",
        }
    }
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )?
        .install()?;

    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("resilience_attempts_total", "Attempts made against a target");
    describe_histogram!(
        "resilience_attempt_duration_seconds",
        "Duration of individual attempts"
    );
    describe_counter!("resilience_retries_total", "Retries scheduled after transient failures");
    describe_counter!(
        "resilience_circuit_transitions_total",
        "Circuit breaker state transitions"
    );
    describe_gauge!(
        "resilience_circuit_state",
        "Circuit breaker state (0=closed, 1=half-open, 2=open)"
    );
    describe_counter!(
        "resilience_rejected_calls_total",
        "Calls rejected while the circuit was open"
    );
}

pub fn record_attempt(target: &str, succeeded: bool, elapsed: Duration) {
    let outcome = if succeeded { "success" } else { "failure" };
    counter!("resilience_attempts_total", "target" => target.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("resilience_attempt_duration_seconds", "target" => target.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_retry(target: &str) {
    counter!("resilience_retries_total", "target" => target.to_string()).increment(1);
}

pub fn record_circuit_transition(target: &str, state: CircuitGauge) {
    counter!(
        "resilience_circuit_transitions_total",
        "target" => target.to_string(),
        "to" => state.label()
    )
    .increment(1);
    gauge!("resilience_circuit_state", "target" => target.to_string()).set(state.value());
}

pub fn record_rejection(target: &str) {
    counter!("resilience_rejected_calls_total", "target" => target.to_string()).increment(1);
}
