//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! ResiliencePipeline::execute(action):
//!     → circuit_breaker.rs (reject fast if Open, admit one trial if Half-Open)
//!     → retries.rs (up to max_retries + 1 attempts, classify failures)
//!         → timeouts.rs (bound each attempt)
//!             → action
//!         → circuit_breaker.rs (count each failed attempt, stop if opened)
//!         → backoff.rs (exponential delay + jitter between attempts)
//!     → circuit_breaker.rs (a successful call resets the counter)
//! ```
//!
//! # Design Decisions
//! - Composition order is fixed: breaker outside retry, retry outside timeout
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Retryability is data (`Classify`), not error-type inspection
//! - Every failed attempt counts toward the breaker, across calls
//! - Cancellation is never counted as a failure

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSnapshot, CallPermit, CircuitBreaker, CircuitStatus};
pub use error::{AttemptError, Classify, FailureKind, ResilienceError};
pub use pipeline::ResiliencePipeline;
pub use policy::PolicyConfig;
