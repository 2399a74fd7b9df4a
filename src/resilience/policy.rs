//! Per-target resilience policy.

use std::time::Duration;

/// Immutable policy parameters for one target.
///
/// Built once at startup (usually through [`crate::config::TargetConfig::policy`])
/// and owned by the pipeline for that target.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Base of the exponential backoff (`backoff_base ^ attempt`).
    pub backoff_base: f64,
    /// Scale each delay by a uniform factor in [0.5, 1.5].
    pub use_jitter: bool,
    /// Consecutive failed attempts, counted across calls, that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial is admitted.
    pub break_duration: Duration,
    /// Cap for the unjittered backoff delay.
    pub max_backoff: Duration,
    /// Duration of one backoff step; the exponential term is multiplied by it.
    pub backoff_unit: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: 2.0,
            use_jitter: true,
            failure_threshold: 5,
            break_duration: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl PolicyConfig {
    /// Total number of attempts a single call may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
