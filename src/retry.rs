//! Retry logic with pluggable backoff strategies
//!
//! Wraps a single fallible fetch with up to `max_attempts` total tries.
//! Between attempts (never after the last) the task sleeps for a delay
//! computed by the configured [`BackoffStrategy`]:
//!
//! - `exponential`: `base_delay * 2^attempt_index`, capped at `max_delay`
//! - `fixed`: the constant `fixed_delay`
//! - `random`: uniform within `[random_min_delay, random_max_delay]`, to
//!   desynchronize retries across assets processed in sequence
//!
//! The executor is stateless across invocations: each tick starts every
//! asset's attempt counter at zero.
//!
//! # Example
//!
//! ```no_run
//! use chart_dl::retry::{IsRetryable, fetch_with_retry};
//! use chart_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "transient")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = fetch_with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{BackoffStrategy, RetryConfig};
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// This is the seam between failure kinds and retry policy. The current
/// mapping retries everything (matching the collector's historical behavior);
/// a future policy can flip individual kinds without touching the executor.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        // Every kind maps to "retry" today. The arms stay separate so that,
        // for example, Status { status: 4xx } can become non-retryable later
        // without restructuring.
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::Connect { .. } => true,
            FetchError::Status { .. } => true,
            FetchError::Body { .. } => true,
            FetchError::Transport { .. } => true,
        }
    }
}

/// Compute the delay before attempt `attempt_index + 1`
///
/// `attempt_index` is zero-based: the delay after the first failed attempt is
/// `compute_delay(config, 0)`.
pub fn compute_delay(config: &RetryConfig, attempt_index: u32) -> Duration {
    match config.strategy {
        BackoffStrategy::Exponential => {
            // 2^31 already overflows any sane base; clamp the shift so the
            // multiplier stays in u32 and let the cap take over
            let shift = attempt_index.min(31);
            config
                .base_delay
                .checked_mul(1u32 << shift)
                .unwrap_or(config.max_delay)
                .min(config.max_delay)
        }
        BackoffStrategy::Fixed => config.fixed_delay,
        BackoffStrategy::Random => {
            let min = config.random_min_delay.as_secs_f64();
            let max = config.random_max_delay.as_secs_f64().max(min);
            let mut rng = rand::thread_rng();
            Duration::from_secs_f64(rng.gen_range(min..=max))
        }
    }
}

/// Execute an async fetch with up to `max_attempts` total tries
///
/// Sleeps between attempts according to the configured strategy; never
/// sleeps after the final attempt. Returns the successful result, or the
/// last error once attempts are exhausted (or immediately for a
/// non-retryable error).
pub async fn fetch_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt_index: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt_index > 0 {
                    tracing::info!(
                        attempts = attempt_index + 1,
                        "operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt_index + 1 < config.max_attempts => {
                let delay = compute_delay(config, attempt_index);
                attempt_index += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt_index,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "attempt failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt_index + 1,
                        "operation failed after all attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
