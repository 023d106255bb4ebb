//! Retry policies for reconnecting streams and block transfers.
//!
//! A [`RetryPolicy`] answers one question: after `n` consecutive failures,
//! may the caller try again, and how long should it wait first? Keeping the
//! answer in a value rather than in loop counters lets the watch session, the
//! log follower and the block workers share the same rules and be tested
//! without any I/O.

use std::time::Duration;

/// Upper bound for exponential block retry backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded or unbounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after consecutive failures (`None` = unbounded).
    max_retries: Option<u32>,
    /// Base delay before a retry.
    delay: Duration,
    /// Double the delay for each consecutive failure.
    exponential: bool,
}

impl RetryPolicy {
    /// Allow at most `max_retries` retries, with no delay between attempts.
    pub fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            delay: Duration::ZERO,
            exponential: false,
        }
    }

    /// Retry forever.
    pub fn unbounded() -> Self {
        Self {
            max_retries: None,
            delay: Duration::ZERO,
            exponential: false,
        }
    }

    /// Set a fixed delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Double the delay after each consecutive failure, capped at 5 seconds.
    pub fn with_exponential_backoff(mut self, base: Duration) -> Self {
        self.delay = base;
        self.exponential = true;
        self
    }

    /// Maximum retries, or `None` when unbounded.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Whether another attempt is allowed after `consecutive_failures` failures.
    ///
    /// `consecutive_failures` counts the failure that just happened, so a
    /// policy of `bounded(1)` allows a retry after the first failure and
    /// refuses after the second.
    pub fn should_retry(&self, consecutive_failures: u32) -> bool {
        match self.max_retries {
            Some(max) => consecutive_failures <= max,
            None => true,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        if !self.exponential || consecutive_failures <= 1 {
            return self.delay;
        }
        let factor = 2u32.saturating_pow((consecutive_failures - 1).min(16));
        self.delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(1)
    }
}
