//! Retry logic and backoff calculations for downloads

use super::config::RetryConfig;
use std::time::Duration;
use yama_errors::{Error, NetworkError, UserFacingError};

/// Calculate exponential backoff delay with jitter
///
/// `attempt` is the number of the attempt that just failed, starting at 1.
pub(super) fn calculate_backoff_delay(retry_config: &RetryConfig, attempt: u32) -> Duration {
    // Precision loss acceptable for backoff calculations
    #[allow(clippy::cast_precision_loss)]
    let base_delay = retry_config
        .initial_delay
        .as_millis()
        .min(u128::from(u64::MAX)) as f64;
    #[allow(clippy::cast_precision_loss)]
    let max_delay = retry_config.max_delay.as_millis().min(u128::from(u64::MAX)) as f64;

    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let delay = (base_delay * retry_config.backoff_multiplier.powi(exponent)).min(max_delay);

    // Add jitter
    let jitter = delay * retry_config.jitter_factor * (rand::random::<f64>() - 0.5);

    // Safe cast: max(0.0) ensures non-negative, round() handles fractional part
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let final_delay = (delay + jitter).max(0.0).round() as u64;

    Duration::from_millis(final_delay)
}

/// Delay before the next attempt, honouring a server `Retry-After`
pub(super) fn next_delay(retry_config: &RetryConfig, attempt: u32, error: &Error) -> Duration {
    let backoff = calculate_backoff_delay(retry_config, attempt);
    match error {
        Error::Network(NetworkError::RateLimited {
            retry_after: Some(seconds),
        }) => backoff
            .max(Duration::from_secs(*seconds))
            .min(retry_config.max_delay),
        _ => backoff,
    }
}

/// Whether a failed attempt is worth repeating
pub(super) fn is_transient(error: &Error) -> bool {
    match error {
        Error::Network(err) => err.is_retryable(),
        _ => false,
    }
}
