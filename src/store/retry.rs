use std::future::Future;
use std::time::Duration;

use super::StoreError;

/// Retry-with-backoff settings for store calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub attempts: u32,
    /// Delay before the first retry, doubled for each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

/// Run a store operation, retrying transient `Unavailable` failures.
///
/// Any other error is returned immediately.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(StoreError::Unavailable(reason)) if attempt < attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Store {} failed (attempt {}/{}): {}. Retrying in {:?}",
                    op_name,
                    attempt,
                    attempts,
                    reason,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
