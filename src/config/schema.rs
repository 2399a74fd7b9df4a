//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the outbound targets.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::PolicyConfig;

/// Root configuration: observability settings plus one entry per target.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServicesConfig {
    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Outbound targets keyed by name.
    #[serde(default, alias = "ExternalServices")]
    pub targets: BTreeMap<String, TargetConfig>,
}

impl ServicesConfig {
    /// Look up a target by name.
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name)
    }
}

/// Connection and policy settings for one external service.
///
/// The PascalCase aliases accept the field names used by existing
/// service configuration files (`NumberOfRetrys` included).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TargetConfig {
    /// Base URL of the service.
    #[serde(alias = "Url")]
    pub url: String,

    /// Bearer token sent with every request.
    #[serde(alias = "Token")]
    pub token: String,

    /// Per-attempt timeout in seconds.
    #[serde(alias = "TimeoutInSeconds")]
    pub timeout_in_seconds: u64,

    /// Retries after the first attempt.
    #[serde(alias = "NumberOfRetrys", alias = "number_of_retrys")]
    pub number_of_retries: u32,

    /// Consecutive failed attempts before the circuit opens.
    #[serde(alias = "HandledEventsAllowedBeforeBreaking")]
    pub handled_events_allowed_before_breaking: u32,

    /// How long the circuit stays open, in minutes.
    #[serde(alias = "DurationOfBreakInMinutes")]
    pub duration_of_break_in_minutes: u64,

    /// Base of the exponential backoff.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,

    /// Randomize each backoff delay in [0.5x, 1.5x].
    #[serde(default = "default_use_jitter")]
    pub use_jitter: bool,

    /// Upper bound for a single (unjittered) backoff delay, in seconds.
    #[serde(default = "default_max_backoff_seconds")]
    pub max_backoff_seconds: u64,

    /// Length of one backoff step in milliseconds.
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

fn default_backoff_base() -> f64 {
    2.0
}

fn default_use_jitter() -> bool {
    true
}

fn default_max_backoff_seconds() -> u64 {
    60
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

impl TargetConfig {
    /// Create a target with the given connection settings and default policy knobs.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout_in_seconds: 30,
            number_of_retries: 3,
            handled_events_allowed_before_breaking: 5,
            duration_of_break_in_minutes: 1,
            backoff_base: default_backoff_base(),
            use_jitter: default_use_jitter(),
            max_backoff_seconds: default_max_backoff_seconds(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }

    /// Convert into the immutable policy owned by a pipeline.
    ///
    /// Assumes the config has passed validation.
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            timeout: Duration::from_secs(self.timeout_in_seconds),
            max_retries: self.number_of_retries,
            backoff_base: self.backoff_base,
            use_jitter: self.use_jitter,
            failure_threshold: self.handled_events_allowed_before_breaking,
            break_duration: Duration::from_secs(self.duration_of_break_in_minutes.saturating_mul(60)),
            max_backoff: Duration::from_secs(self.max_backoff_seconds),
            backoff_unit: Duration::from_millis(self.backoff_unit_ms),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
