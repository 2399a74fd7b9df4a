//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds > 0)
//! - Check that target URLs are absolute http(s) URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServicesConfig → Result<(), Vec<ValidationError>>
//! - Runs before any pipeline is constructed

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{ServicesConfig, TargetConfig};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `targets.billing.url`.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServicesConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.targets.is_empty() {
        errors.push(ValidationError::new("targets", "at least one target is required"));
    }

    for (name, target) in &config.targets {
        validate_target(name, target, &mut errors);
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_target(name: &str, target: &TargetConfig, errors: &mut Vec<ValidationError>) {
    let field = |f: &str| format!("targets.{name}.{f}");

    if name.trim().is_empty() {
        errors.push(ValidationError::new("targets", "target name must not be empty"));
    }

    if target.url.trim().is_empty() {
        errors.push(ValidationError::new(field("url"), "is required"));
    } else {
        match Url::parse(&target.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(url) => errors.push(ValidationError::new(
                field("url"),
                format!("unsupported URL '{}' (scheme '{}')", target.url, url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                field("url"),
                format!("malformed URL '{}': {}", target.url, e),
            )),
        }
    }

    if target.token.trim().is_empty() {
        errors.push(ValidationError::new(field("token"), "is required"));
    }

    if target.timeout_in_seconds == 0 {
        errors.push(ValidationError::new(field("timeout_in_seconds"), "must be positive"));
    }

    if target.handled_events_allowed_before_breaking == 0 {
        errors.push(ValidationError::new(
            field("handled_events_allowed_before_breaking"),
            "must be positive",
        ));
    }

    if target.duration_of_break_in_minutes == 0 {
        errors.push(ValidationError::new(
            field("duration_of_break_in_minutes"),
            "must be positive",
        ));
    }

    if !target.backoff_base.is_finite() || target.backoff_base < 1.0 {
        errors.push(ValidationError::new(
            field("backoff_base"),
            format!("must be a finite number >= 1.0, got {}", target.backoff_base),
        ));
    }

    if target.max_backoff_seconds == 0 {
        errors.push(ValidationError::new(field("max_backoff_seconds"), "must be positive"));
    }

    if target.backoff_unit_ms == 0 {
        errors.push(ValidationError::new(field("backoff_unit_ms"), "must be positive"));
    }
}
