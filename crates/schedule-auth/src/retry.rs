//! Retry utilities with exponential backoff.
//!
//! Used by the directory provider around its connection step. Retries never
//! wrap a credential check: a definitive rejection must not be re-attempted.

use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial delay before the first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Base for exponential backoff (typically 2.0)
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Configuration allowing `retries` additional attempts after the first.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Self::default()
        }
    }
}

/// Execute a function with retries for errors accepted by `is_retryable`.
///
/// Errors rejected by the predicate are returned immediately. Retryable
/// errors are retried with exponential backoff until `max_attempts` is
/// reached, then the last error is returned.
///
/// # Example
///
/// ```rust,no_run
/// use schedule_auth::retry::{with_retry_if, RetryConfig};
///
/// #[derive(Debug)]
/// enum DialError {
///     Refused,
///     BadCertificate,
/// }
///
/// async fn example() -> Result<(), DialError> {
///     with_retry_if(
///         &RetryConfig::with_retries(1),
///         || async { Err(DialError::Refused) },
///         |err| matches!(err, DialError::Refused),
///     )
///     .await
/// }
/// ```
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    mut f: F,
    mut is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
    P: FnMut(&E) -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !is_retryable(&e) => {
                tracing::debug!(error = ?e, "Error is not retryable, returning immediately");
                return Err(e);
            }
            Err(e) if attempt >= config.max_attempts => {
                tracing::error!(attempts = attempt, error = ?e, "All retry attempts exhausted");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = ?e,
                    "Attempt failed, retrying"
                );

                sleep(delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.exponential_base).min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}
