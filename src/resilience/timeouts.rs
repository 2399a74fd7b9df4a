//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every individual attempt with the policy timeout
//! - Cancel the in-flight action cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the action future is dropped on expiry
//! - Timeout errors are distinct from action errors
//! - The whole retry sequence is NOT bounded, only each attempt

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::resilience::AttemptError;

/// Run one attempt, mapping an elapsed deadline to [`AttemptError::Timeout`].
pub async fn with_timeout<F, T, E>(duration: Duration, attempt: F) -> Result<T, AttemptError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, attempt).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AttemptError::Failed(e)),
        Err(_) => Err(AttemptError::Timeout(duration)),
    }
}
