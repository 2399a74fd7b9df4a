//! Failure classification and the terminal error returned by the pipeline.

use std::time::Duration;

use thiserror::Error;

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Temporary failure (network blip, 5xx, timeout). Retried.
    Transient,
    /// Permanent failure (malformed request, 4xx). Propagated immediately.
    NonTransient,
}

/// Classification of an action's error type.
///
/// Retryability is decided from data returned by the action, never from the
/// concrete type of the error.
pub trait Classify {
    fn kind(&self) -> FailureKind;

    fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

/// Failure of a single attempt.
#[derive(Debug, Error)]
pub enum AttemptError<E> {
    /// The attempt did not finish within the policy timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The action itself returned an error.
    #[error("{0}")]
    Failed(E),
}

impl<E: Classify> AttemptError<E> {
    /// Timeouts are always transient.
    pub fn kind(&self) -> FailureKind {
        match self {
            AttemptError::Timeout(_) => FailureKind::Transient,
            AttemptError::Failed(e) => e.kind(),
        }
    }
}

/// Terminal failure of a call through the pipeline.
///
/// Callers can pick a fallback per variant, e.g. serve cached data only on
/// [`ResilienceError::CircuitOpen`].
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// Every attempt failed transiently and the retry budget is spent.
    #[error("'{target}' still failing after {attempts} attempts: {last}")]
    RetriesExhausted {
        target: String,
        attempts: u32,
        last: AttemptError<E>,
    },

    /// The action failed with a non-retryable error.
    #[error("'{target}' rejected the call on attempt {attempts}: {error}")]
    NonTransient {
        target: String,
        attempts: u32,
        error: E,
    },

    /// The circuit is open; the action was not invoked.
    #[error("circuit for '{target}' is open, retry after {retry_after:?}")]
    CircuitOpen { target: String, retry_after: Duration },

    /// The caller cancelled the call.
    #[error("call to '{target}' cancelled after {attempts} attempts")]
    Cancelled { target: String, attempts: u32 },
}

impl<E> ResilienceError<E> {
    /// Target the failed call was made against.
    pub fn target(&self) -> &str {
        match self {
            ResilienceError::RetriesExhausted { target, .. }
            | ResilienceError::NonTransient { target, .. }
            | ResilienceError::CircuitOpen { target, .. }
            | ResilienceError::Cancelled { target, .. } => target,
        }
    }

    /// Number of times the action was invoked (0 for a short-circuit).
    pub fn attempts(&self) -> u32 {
        match self {
            ResilienceError::RetriesExhausted { attempts, .. }
            | ResilienceError::NonTransient { attempts, .. }
            | ResilienceError::Cancelled { attempts, .. } => *attempts,
            ResilienceError::CircuitOpen { .. } => 0,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled { .. })
    }

    /// True when retries ran out and the last attempt timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ResilienceError::RetriesExhausted {
                last: AttemptError::Timeout(_),
                ..
            }
        )
    }

    /// The action's own error, if the call ended on one.
    pub fn inner(&self) -> Option<&E> {
        match self {
            ResilienceError::RetriesExhausted {
                last: AttemptError::Failed(e),
                ..
            } => Some(e),
            ResilienceError::NonTransient { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Boom(FailureKind);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl Classify for Boom {
        fn kind(&self) -> FailureKind {
            self.0
        }
    }

    #[test]
    fn test_timeout_is_transient() {
        let err: AttemptError<Boom> = AttemptError::Timeout(Duration::from_secs(1));
        assert_eq!(err.kind(), FailureKind::Transient);

        let err = AttemptError::Failed(Boom(FailureKind::NonTransient));
        assert_eq!(err.kind(), FailureKind::NonTransient);
    }

    #[test]
    fn test_error_accessors() {
        let err: ResilienceError<Boom> = ResilienceError::RetriesExhausted {
            target: "weather".into(),
            attempts: 3,
            last: AttemptError::Timeout(Duration::from_secs(5)),
        };
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.target(), "weather");
        assert!(err.is_timeout());
        assert!(err.inner().is_none());
        assert!(err.to_string().contains("after 3 attempts"));

        let err: ResilienceError<Boom> = ResilienceError::CircuitOpen {
            target: "weather".into(),
            retry_after: Duration::from_secs(10),
        };
        assert_eq!(err.attempts(), 0);
        assert!(err.is_circuit_open());
        assert!(!err.is_cancelled());
    }
}
