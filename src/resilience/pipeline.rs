//! The composed pipeline: circuit breaker → retry → timeout → action.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::observability::{EventSink, TracingEventSink};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitStatus};
use crate::resilience::retries::run_with_retries;
use crate::resilience::{Classify, PolicyConfig, ResilienceError};

/// Resilience pipeline for one target.
///
/// Share it between callers with `Arc`; the breaker is the only state
/// mutated across calls.
///
/// # Example
///
/// ```rust,no_run
/// use resilience_pipeline::resilience::{Classify, FailureKind, PolicyConfig, ResiliencePipeline};
///
/// #[derive(Debug)]
/// struct Unavailable;
///
/// impl std::fmt::Display for Unavailable {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "service unavailable")
///     }
/// }
///
/// impl Classify for Unavailable {
///     fn kind(&self) -> FailureKind {
///         FailureKind::Transient
///     }
/// }
///
/// # async fn example() {
/// let pipeline = ResiliencePipeline::with_tracing("weather", PolicyConfig::default());
/// let result = pipeline.execute(|| async { Ok::<_, Unavailable>(21) }).await;
/// assert_eq!(result.unwrap(), 21);
/// # }
/// ```
pub struct ResiliencePipeline {
    target: String,
    policy: PolicyConfig,
    breaker: CircuitBreaker,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for ResiliencePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResiliencePipeline")
            .field("target", &self.target)
            .field("policy", &self.policy)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl ResiliencePipeline {
    /// Create a pipeline reporting to `sink`.
    pub fn new(target: impl Into<String>, policy: PolicyConfig, sink: Arc<dyn EventSink>) -> Self {
        let target = target.into();
        let breaker = CircuitBreaker::new(
            target.clone(),
            policy.failure_threshold,
            policy.break_duration,
            sink.clone(),
        );

        Self {
            target,
            policy,
            breaker,
            sink,
        }
    }

    /// Create a pipeline reporting through [`TracingEventSink`].
    pub fn with_tracing(target: impl Into<String>, policy: PolicyConfig) -> Self {
        Self::new(target, policy, Arc::new(TracingEventSink))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn circuit_status(&self) -> CircuitStatus {
        self.breaker.status()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.breaker.snapshot().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Execute `action` under breaker, retry and timeout protection.
    ///
    /// Dropping the returned future cancels the call like
    /// [`execute_with_cancellation`](Self::execute_with_cancellation) does.
    pub async fn execute<F, Fut, T, E>(&self, action: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        self.execute_with_cancellation(&CancellationToken::new(), action)
            .await
    }

    /// Execute `action`, aborting as soon as `cancel` fires.
    ///
    /// Cancellation drops the in-flight attempt, skips remaining retries and
    /// does not count as a failure for the breaker.
    pub async fn execute_with_cancellation<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        action: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let span = tracing::info_span!(
            "resilient_call",
            target_name = %self.target,
            call_id = %Uuid::new_v4(),
        );

        self.run(cancel, action).instrument(span).await
    }

    async fn run<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        action: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let mut permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(retry_after) => {
                return Err(ResilienceError::CircuitOpen {
                    target: self.target.clone(),
                    retry_after,
                });
            }
        };

        if permit.is_trial() {
            tracing::debug!("Running half-open trial call");
        }

        let result = run_with_retries(
            &self.target,
            &self.policy,
            self.sink.as_ref(),
            cancel,
            Some(&mut permit),
            action,
        )
        .await;

        // Failures were counted attempt by attempt.
        if result.is_ok() {
            permit.record_success();
        }

        result
    }
}
