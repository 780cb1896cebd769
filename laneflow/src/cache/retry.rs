//! Bounded retry with exponential backoff, composed with an outer timeout.
//!
//! [`retry_with_timeout`] is the one primitive every cache operation goes
//! through. The timeout wraps the whole attempt sequence, so the wall-clock
//! bound is the timeout while the policy bounds how many backend calls fit
//! inside it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::RetrySettings;
use crate::errors::{BackendError, CacheError};

/// Jitter strategy applied on top of the exponential delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

impl JitterStrategy {
    /// Applies jitter to a delay.
    #[must_use]
    pub fn apply(self, delay: Duration) -> Duration {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match self {
            Self::None => delay,
            Self::Full => {
                if millis == 0 {
                    delay
                } else {
                    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
                }
            }
            Self::Equal => {
                let half = millis / 2;
                if half == 0 {
                    delay
                } else {
                    Duration::from_millis(half + rand::thread_rng().gen_range(0..=half))
                }
            }
        }
    }
}

/// Exponential backoff policy with a capped delay and a bounded retry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
    max_retries: u32,
    jitter: JitterStrategy,
}

impl BackoffPolicy {
    /// Creates a policy without jitter.
    #[must_use]
    pub fn new(initial: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            max,
            max_retries,
            jitter: JitterStrategy::None,
        }
    }

    /// Builds a policy from configuration.
    #[must_use]
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.backoff_initial(),
            settings.backoff_max(),
            settings.max_retries,
        )
        .with_jitter(settings.jitter)
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Maximum number of retries after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Maximum number of backend calls, first attempt included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the given retry (1-based), before jitter.
    ///
    /// `initial * 2^(retry - 1)`, capped at the maximum delay.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let shift = (retry - 1).min(31);
        self.initial
            .checked_mul(1_u32 << shift)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Delay before the given retry (1-based), jitter applied.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.jitter.apply(self.base_delay(retry))
    }
}

/// Runs `op` until it succeeds or the policy's retries are spent.
///
/// On exhaustion the last backend failure is returned together with the
/// number of attempts made.
pub async fn with_retry<T, F, Fut>(
    operation: &'static str,
    policy: &BackoffPolicy,
    mut op: F,
) -> Result<T, CacheError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt <= policy.max_retries() => {
                let delay = policy.delay_for_retry(attempt);
                debug!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Retrying cache operation"
                );
                tokio::time::sleep(delay).await;
            }
            Err(source) => {
                return Err(CacheError::Backend {
                    operation,
                    attempts: attempt,
                    source,
                })
            }
        }
    }
}

/// Runs [`with_retry`] under a single deadline covering every attempt.
pub async fn retry_with_timeout<T, F, Fut>(
    operation: &'static str,
    policy: &BackoffPolicy,
    timeout: Duration,
    op: F,
) -> Result<T, CacheError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(timeout, with_retry(operation, policy, op)).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout {
            operation,
            after: timeout,
        }),
    }
}
