//! Bounded retry around a single fallible async operation

use crate::config::RetrySettings;
use crate::error::AppError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base`, `2 * base`, `4 * base`, ... capped at `max`
    Exponential { base: Duration, max: Duration },
}

/// How many times an operation is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; never below 1
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        let base = Duration::from_millis(settings.base_delay_ms);
        let backoff = if settings.exponential {
            Backoff::Exponential {
                base,
                max: Duration::from_millis(settings.max_delay_ms),
            }
        } else {
            Backoff::Fixed(base)
        };
        Self::new(settings.max_attempts, backoff)
    }

    /// Wait after the `failed_attempt`-th failure (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. A server `Retry-After` hint
    /// replaces the computed delay when it is longer. Once the budget is spent
    /// on a retryable error, the last error is wrapped in
    /// [`AppError::RetriesExhausted`], which keeps the last error's kind.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1u32;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    if self.max_attempts == 1 {
                        return Err(e);
                    }
                    return Err(AppError::retries_exhausted(operation, attempt, &e));
                }
                Err(e) => {
                    let computed = self.delay_for(attempt);
                    let wait = e.retry_after().map_or(computed, |hint| hint.max(computed));
                    warn!(
                        "{operation} failed: {e}. Retrying in {wait:?} (attempt {}/{})",
                        attempt + 1,
                        self.max_attempts
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}
