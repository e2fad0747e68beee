//! Fixed-delay bounded retry.
//!
//! A [`RetrySpec`] wraps a zero-argument async operation and reattempts it
//! while the raised error satisfies its predicate and attempts
//! remain. When the budget runs out the error of the last attempt is
//! returned as-is, so callers always see the real upstream cause.
//!
//! A `RetrySpec` holds no per-call state: `run` builds a fresh
//! [`RetryBudget`] each time, so one value can back any number of
//! concurrent operations.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use movie_types::UpstreamError;

/// Pure function over the error deciding whether another attempt may help.
pub type RetryPredicate = fn(&UpstreamError) -> bool;

/// Default budget: 3 retries after the first try, 1s apart.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bounded retry configuration.
#[derive(Clone, Copy)]
pub struct RetrySpec {
    max_attempts: u32,
    delay: Duration,
    retryable: RetryPredicate,
}

impl RetrySpec {
    /// `max_retries` additional attempts after the first failure, waiting
    /// `delay` before each one. Retries only `UpstreamUnavailable`.
    pub fn fixed_delay(max_retries: u32, delay: Duration) -> Self {
        Self::with_max_attempts(max_retries.saturating_add(1), delay)
    }

    /// `max_attempts` total attempts (initial try included). Zero is
    /// treated as one.
    pub fn with_max_attempts(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            retryable: UpstreamError::is_retryable,
        }
    }

    /// A single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::with_max_attempts(1, Duration::ZERO)
    }

    /// Replace the retry predicate.
    pub fn with_predicate(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_retryable(&self, error: &UpstreamError) -> bool {
        (self.retryable)(error)
    }

    /// Worst-case time spent waiting between attempts, excluding the calls.
    pub fn worst_case_delay(&self) -> Duration {
        self.delay * (self.max_attempts - 1)
    }

    /// A fresh attempt counter for one operation.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            max_attempts: self.max_attempts,
            attempts_made: 0,
        }
    }

    /// Run `operation` under this spec.
    ///
    /// Dropping the returned future cancels whatever is in flight: the
    /// current attempt or the wait before the next one. The next attempt
    /// is only started after the wait finishes.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut budget = self.budget();
        loop {
            budget.record_attempt();
            let error = match operation().await {
                Ok(value) => {
                    if budget.attempts_made() > 1 {
                        debug!("Operation succeeded after {} attempts", budget.attempts_made());
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.is_retryable(&error) {
                debug!("Non-retryable error ({}): {}", error.kind(), error);
                return Err(error);
            }

            if budget.is_exhausted() {
                warn!(
                    "Giving up after {} attempts. Last error: {}",
                    budget.attempts_made(),
                    error
                );
                return Err(error);
            }

            warn!(
                "Attempt {} of {} failed: {}. Retrying in {:?}...",
                budget.attempts_made(),
                self.max_attempts,
                error,
                self.delay
            );
            sleep(self.delay).await;
        }
    }
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self::fixed_delay(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl fmt::Debug for RetrySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySpec")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Attempts used and left for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    attempts_made: u32,
}

impl RetryBudget {
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts_made)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_remaining() == 0
    }

    pub fn record_attempt(&mut self) {
        self.attempts_made = self.attempts_made.saturating_add(1);
    }
}
