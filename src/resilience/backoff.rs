//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::resilience::PolicyConfig;

/// Lower bound of the jitter factor.
pub const JITTER_MIN: f64 = 0.5;
/// Upper bound of the jitter factor.
pub const JITTER_MAX: f64 = 1.5;

/// Unjittered delay to wait after failed attempt `attempt` (1-based).
///
/// `backoff_base ^ attempt` steps of `backoff_unit`, capped at `max_backoff`.
pub fn base_delay(attempt: u32, policy: &PolicyConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = policy.backoff_unit.as_secs_f64() * policy.backoff_base.powi(exponent);
    let capped = secs.min(policy.max_backoff.as_secs_f64());

    if capped.is_finite() && capped >= 0.0 {
        Duration::from_secs_f64(capped)
    } else {
        policy.max_backoff
    }
}

/// Scale a delay by a uniform random factor in [`JITTER_MIN`, `JITTER_MAX`].
pub fn apply_jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
    delay.mul_f64(factor)
}

/// Calculate the delay before the attempt following `attempt`.
pub fn calculate_backoff(attempt: u32, policy: &PolicyConfig) -> Duration {
    let delay = base_delay(attempt, policy);
    if policy.use_jitter {
        apply_jitter(delay)
    } else {
        delay
    }
}
