//! Bounded retry with rate-limit awareness.
//!
//! Every outbound call (playlist fetch, user lookup, message delivery) goes
//! through a [`RetryPolicy`]. The error type decides how each failure is
//! treated by implementing [`Retryable`]:
//!
//! - `RateLimited(Some(d))` sleeps exactly `d` before the next attempt
//! - `RateLimited(None)` sleeps a fallback proportional to the attempt number
//! - `Backoff` sleeps an exponential delay plus random jitter
//! - `Abort` returns the error immediately
//!
//! All retryable outcomes share one attempt ceiling; exhausting it returns the
//! last error.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::emit;
use crate::metrics::events::{RetryReason, RetryScheduled};

/// How a failed attempt should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The remote side asked us to slow down, optionally saying for how long.
    RateLimited(Option<Duration>),
    /// Transient failure; retry after exponential backoff.
    Backoff,
    /// Permanent failure; do not retry.
    Abort,
}

/// Classification of an error for the retry policy.
pub trait Retryable {
    fn retry_decision(&self) -> RetryDecision;
}

/// Retry ceiling and delay shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt on backoff; doubles afterwards.
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound for the random jitter added to backoff delays.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries up to `max_attempts` times without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Exponential delay for the given (1-based) failed attempt, plus jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        exponential + random_jitter(self.max_jitter)
    }

    /// Fallback wait when a rate-limit response carries no explicit duration.
    pub fn rate_limit_fallback(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }

    /// Run `op` until it succeeds, fails permanently, or the ceiling is hit.
    ///
    /// `operation` names the call in logs and metrics.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let (delay, reason) = match err.retry_decision() {
                RetryDecision::Abort => return Err(err),
                _ if attempt >= self.max_attempts => {
                    warn!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Giving up after exhausting retries"
                    );
                    return Err(err);
                }
                RetryDecision::RateLimited(Some(delay)) => (delay, RetryReason::RateLimited),
                RetryDecision::RateLimited(None) => {
                    (self.rate_limit_fallback(attempt), RetryReason::RateLimited)
                }
                RetryDecision::Backoff => (self.backoff_delay(attempt), RetryReason::Backoff),
            };

            warn!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = reason.as_str(),
                error = %err,
                "Retrying"
            );
            emit!(RetryScheduled {
                operation,
                reason,
                delay,
            });

            tokio::time::sleep(delay).await;
        }
    }
}

/// Generate a random jitter duration in `[0, max)`.
pub fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms > 0 {
        Duration::from_millis(rand::rng().random_range(0..max_ms))
    } else {
        Duration::ZERO
    }
}
