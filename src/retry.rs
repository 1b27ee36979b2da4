//! Backoff policies and retry utilities.
//!
//! Stream subscribers consult a [`BackoffPolicy`] after every failed
//! connection attempt. The policy is a pure function of the retry count, so
//! fixed, exponential, or jittered schedules can be swapped in without
//! touching the subscriber.
//!
//! [`RetryPolicy`] and [`retry_async`] are the transport-level helpers used by
//! the optional publish retry.

use std::fmt::Debug;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Outcome of consulting a backoff policy after a failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    /// Try again after the given delay.
    Retry(Duration),
    /// Stop retrying.
    GiveUp,
}

/// Maps the number of consecutive failures to a retry decision.
///
/// `retry_count` is 1 after the first failure, 2 after the second, and so on.
pub trait BackoffPolicy: Debug + Send + Sync {
    fn decide(&self, retry_count: u32) -> RetryDecision;
}

/// Constant delay between attempts, giving up once `retry_count` exceeds
/// `max_retries`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedBackoff {
    pub max_retries: u32,
    pub delay: Duration,
}

impl BackoffPolicy for FixedBackoff {
    fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count > self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay)
        }
    }
}

/// Exponential backoff with a cap and lightweight jitter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExponentialBackoff {
    /// Retries allowed before giving up.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for delay growth.
    pub max: Duration,
    /// Maximum random jitter added to each delay.
    pub jitter: Duration,
}

impl BackoffPolicy for ExponentialBackoff {
    fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count > self.max_retries {
            return RetryDecision::GiveUp;
        }
        let mut delay = self.initial.min(self.max);
        for _ in 1..retry_count {
            delay = std::cmp::min(delay.saturating_mul(2), self.max);
        }
        RetryDecision::Retry(delay + jitter_duration(self.jitter, retry_count as usize))
    }
}

/// Policy controlling transport-level retry attempts for single requests.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of attempts including the first attempt.
    pub max_attempts: usize,
    /// Delay used before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for exponential backoff delay growth.
    pub max_backoff: Duration,
    /// Maximum random jitter added to each retry delay.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Fixed delay between a bounded number of attempts.
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: delay,
            max_backoff: delay,
            jitter: Duration::ZERO,
        }
    }

    /// Computes the delay to apply before the given retry attempt.
    ///
    /// `attempt` is 1-based and should correspond to the current attempt index.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let mut delay = self.initial_backoff;
        for _ in 1..attempt {
            delay = std::cmp::min(delay.saturating_mul(2), self.max_backoff);
        }
        delay + jitter_duration(self.jitter, attempt)
    }
}

/// Executes an async operation with retry behavior controlled by `policy`.
///
/// `op` receives the 1-based attempt number and must return a future that
/// resolves to the operation result. `should_retry` determines whether each
/// error is retryable.
pub async fn retry_async<T, E, Op, Fut, ShouldRetry>(
    policy: &RetryPolicy,
    mut op: Op,
    mut should_retry: ShouldRetry,
) -> Result<T, E>
where
    Op: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    ShouldRetry: FnMut(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= max_attempts || !should_retry(&error) {
                    return Err(error);
                }

                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    event = "retry_attempt_failed",
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}

fn jitter_duration(max_jitter: Duration, attempt: usize) -> Duration {
    if max_jitter.is_zero() {
        return Duration::ZERO;
    }

    let limit_nanos = max_jitter.as_nanos().min(u64::MAX as u128) as u64;
    if limit_nanos == 0 {
        return Duration::ZERO;
    }

    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let mixed = now_nanos ^ ((attempt as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    Duration::from_nanos(mixed % (limit_nanos + 1))
}
