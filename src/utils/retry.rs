use crate::error::{AppError, AppResult};
use log::{debug, info, warn};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// runs out of attempts. Only used for idempotent provider writes.
pub async fn retry_with_exponential_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: F,
) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = AppResult<T>>,
{
    let mut delay = config.base_delay;
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("Operation succeeded on attempt {}", attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts && is_transient_error(&e) => {
                debug!("Attempt {} failed transiently, retrying in {:?}: {}", attempt, delay, e);
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(
                    Duration::from_millis((delay.as_millis() as f64 * config.backoff_multiplier) as u64),
                    config.max_delay,
                );
            }
            Err(e) => {
                if attempt == max_attempts {
                    warn!("Operation failed after {} attempts: {}", max_attempts, e);
                } else {
                    debug!("Attempt {} failed with non-transient error, not retrying: {}", attempt, e);
                }
                return Err(e);
            }
        }
    }

    unreachable!("loop always returns on the last attempt")
}

pub fn is_transient_error(error: &AppError) -> bool {
    match error {
        AppError::ProviderTimeout(_) => true,
        AppError::Network(e) => e.is_timeout() || e.is_connect(),
        AppError::Provider(message) => {
            let message = message.to_lowercase();
            message.contains("timeout")
                || message.contains("connection")
                || message.contains("rate limit")
                || message.contains("429") // Too Many Requests
                || message.contains("502") // Bad Gateway
                || message.contains("503") // Service Unavailable
                || message.contains("504") // Gateway Timeout
        }
        _ => false,
    }
}
