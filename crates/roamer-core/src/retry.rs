//! Bounded retry with exponential backoff, cancellable between attempts.
//!
//! Callers pass a classifier that marks failures as transient or permanent;
//! [`is_retryable_error`] and [`is_retryable_status`] cover plain HTTP.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

/// Retry budget and backoff curve.
///
/// Attempt `n` (zero-based) waits `initial_delay * 2^n`, never more than
/// `max_delay`. The first try is not counted in `max_retries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5, 500, 10_000)
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// No waiting between attempts
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, 0, 0)
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retrying after failed attempt `attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let cap = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let scaled = base.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(scaled.min(cap))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

/// Classify a transport-level failure.
///
/// Timeouts and refused or reset connections are transient. So are
/// server-side statuses (5xx, 408, 429) surfaced through
/// `error_for_status`. Malformed requests and other 4xx are not.
pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_timeout() || error.is_connect() {
        tracing::debug!("Transient transport failure: {}", error);
        return RetryDecision::Retry;
    }

    match error.status() {
        Some(status) if !error.is_request() => is_retryable_status(status),
        _ => RetryDecision::NoRetry,
    }
}

/// Classify an HTTP status returned by a provider.
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => RetryDecision::Retry,
        s if s.is_server_error() => RetryDecision::Retry,
        _ => RetryDecision::NoRetry,
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error was returned
    Permanent(E),
    /// The cancellation token fired
    Cancelled,
}

/// Run `operation` until it succeeds, the retry budget is spent, a
/// non-retryable error is returned, or `cancel` fires.
///
/// The operation receives the zero-based attempt number.
///
/// # Errors
/// Returns [`RetryError`] describing why no value was produced.
///
/// # Example
/// ```ignore
/// let body = with_retry(&policy, &cancel, |e| is_retryable_error(e), |_| async {
///     client.get(url).send().await
/// }).await?;
/// ```
pub async fn with_retry<T, E, F, Fut, C>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    classify: C,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
    E: Display,
{
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(retries = attempt, "Recovered after retrying");
                }
                return Ok(value);
            }
            Err(e) => {
                if classify(&e) == RetryDecision::NoRetry {
                    tracing::debug!("Not retrying: {}", e);
                    return Err(RetryError::Permanent(e));
                }

                if attempt >= config.max_retries {
                    tracing::error!("Giving up after {} attempts: {}", attempt + 1, e);
                    return Err(RetryError::Exhausted {
                        attempts: attempt + 1,
                        last: e,
                    });
                }

                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts(),
                    ?delay,
                    "Transient failure, retrying: {}",
                    e
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }
}
