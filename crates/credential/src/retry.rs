//! Retry with exponential backoff for reinstatement calls

use keyguard_core::config::ReinstatementRetry;
use std::future::Future;
use tokio::time::sleep;

/// Run `f` up to `policy.max_attempts` times, sleeping between failures
///
/// Returns the first success or the last error. At least one attempt is
/// always made.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &ReinstatementRetry,
    operation: &str,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Attempt failed"
                );
                if attempt >= attempts {
                    return Err(e);
                }
                let backoff = policy.backoff_duration(attempt - 1);
                tracing::debug!(
                    operation,
                    backoff_ms = backoff.as_millis() as u64,
                    "Backing off before next attempt"
                );
                sleep(backoff).await;
            }
        }
    }
}
