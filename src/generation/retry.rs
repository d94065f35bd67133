//! Retry and backoff for generation API calls.
//!
//! Transient failures are retried after `2^attempt` backoff units, up to a bounded
//! number of attempts. Fatal failures end the item on first sight.

use crate::config::RunnerConfig;
use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Whether a failure is worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

/// Classify a provider error. Unknown failures are fatal.
pub fn classify(error: &ProviderError) -> ErrorClass {
    match error {
        ProviderError::Timeout(_)
        | ProviderError::Connection(_)
        | ProviderError::ServiceUnavailable(_)
        | ProviderError::Api(_) => ErrorClass::Transient,
        ProviderError::InvalidRequest(_)
        | ProviderError::Authentication(_)
        | ProviderError::PermissionDenied(_)
        | ProviderError::RateLimit(_)
        | ProviderError::Unclassified(_) => ErrorClass::Fatal,
    }
}

/// Result of running one operation under the policy
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed transiently; carries the last error
    Exhausted { error: ProviderError, attempts: u32 },
    Fatal { error: ProviderError, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Fatal { attempts, .. } => *attempts,
        }
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.max_attempts, config.backoff_unit())
    }

    /// Wait after the failed attempt `attempt` (0-based) before the next one
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff_unit.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails fatally, or runs out of attempts.
    ///
    /// No wait follows the final attempt.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            let error = match operation().await {
                Ok(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt + 1,
                    }
                }
                Err(error) => error,
            };

            if classify(&error) == ErrorClass::Fatal {
                warn!(attempt, error = %error, "Fatal generation error");
                return RetryOutcome::Fatal {
                    error,
                    attempts: attempt + 1,
                };
            }

            if attempt + 1 >= self.max_attempts {
                warn!(attempt, error = %error, "Retries exhausted");
                return RetryOutcome::Exhausted {
                    error,
                    attempts: attempt + 1,
                };
            }

            let delay = self.delay_for(attempt);
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient generation error, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
