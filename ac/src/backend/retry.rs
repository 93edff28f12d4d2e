//! Bounded retry with exponential backoff around backend calls

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::BackendError;
use crate::config::RetryConfig;
use crate::error::{CoachError, CoachResult};

/// Retry and timeout parameters for one kind of backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Bounded wait for each attempt
    pub call_timeout: Duration,
    /// Add up to 25% random jitter to each backoff, never past `max_backoff`
    pub jitter: bool,
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), without jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    fn delay_for(&self, retry: u32, err: &BackendError) -> Duration {
        let mut delay = self.backoff(retry);
        if let BackendError::RateLimited {
            retry_after: Some(after),
        } = err
        {
            delay = delay.max(*after).min(self.max_backoff);
        }
        if self.jitter && !delay.is_zero() {
            let spread = delay.as_millis() as u64 / 4;
            delay += Duration::from_millis(rand::rng().random_range(0..=spread));
        }
        delay.min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            jitter: true,
        }
    }
}

/// Run `op` under the policy
///
/// Each attempt is bounded by `call_timeout`. Retryable failures back off
/// and try again up to `max_attempts`; a non-retryable failure stops at
/// once. Either way the caller sees `TutorBackendUnavailable`.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> CoachResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    debug!(%operation, max_attempts = policy.max_attempts, "call_with_retry: called");
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(policy.call_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(policy.call_timeout)),
        };

        let err = match result {
            Ok(value) => {
                debug!(%operation, %attempt, "call_with_retry: success");
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            warn!(%operation, %attempt, error = %err, "Backend call failed, not retrying");
            return Err(CoachError::TutorBackendUnavailable {
                attempts: attempt,
                reason: err.to_string(),
            });
        }

        if attempt >= max_attempts {
            warn!(%operation, %attempt, error = %err, "Backend call failed, retries exhausted");
            return Err(CoachError::TutorBackendUnavailable {
                attempts: attempt,
                reason: err.to_string(),
            });
        }

        let delay = policy.delay_for(attempt, &err);
        warn!(%operation, %attempt, delay_ms = delay.as_millis() as u64, error = %err, "Backend call failed, retrying");
        tokio::time::sleep(delay).await;
    }
}
