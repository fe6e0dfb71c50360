//! Attempt/retry combinators shared by the fetch and probe paths
//!
//! Two shapes of repetition show up in this tool:
//! - "retry until the first success" (mirror fetches), see [`run_attempts`]
//! - "run every attempt and keep all outcomes" (latency averaging), see
//!   [`collect_attempts`]
//!
//! Both are driven by one [`RetryPolicy`], and both can be chained across an
//! ordered list of strategies with [`run_strategies`].

use super::{AppError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{sleep, timeout};

/// Configuration for attempt/retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: usize,
    /// Upper bound for a single attempt
    pub attempt_timeout: Option<Duration>,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Overall wall-clock budget for the whole sequence
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            backoff_multiplier: 2.0,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that runs `attempts` back to back with no delay
    pub fn immediate(attempts: usize, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: attempts,
            attempt_timeout: Some(attempt_timeout),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            deadline: None,
        }
    }

    /// Policy with `retries` extra attempts after the first, backing off
    /// between `min_backoff` and `max_backoff`
    pub fn with_backoff(retries: usize, attempt_timeout: Duration, min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            attempt_timeout: Some(attempt_timeout),
            initial_delay: min_backoff,
            max_delay: max_backoff.max(min_backoff),
            backoff_multiplier: 2.0,
            deadline: None,
        }
    }

    /// Set the overall deadline
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay to wait before attempt number `attempt` (0-based)
    pub fn delay_before(&self, attempt: usize) -> Duration {
        if attempt == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32 - 1);
        let millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }
}

/// Every attempt (or every strategy) failed
#[derive(Error, Debug, Clone)]
#[error("all {attempts} attempt(s) failed, last error: {last_error}")]
pub struct AttemptError {
    /// Number of attempts actually made
    pub attempts: usize,
    /// Error from the final attempt
    pub last_error: AppError,
}

impl From<AttemptError> for AppError {
    fn from(error: AttemptError) -> Self {
        error.last_error
    }
}

/// Remaining budget, or `None` if there is no deadline
fn remaining(started: Instant, deadline: Option<Duration>) -> Option<Duration> {
    deadline.map(|d| d.saturating_sub(started.elapsed()))
}

/// Run one attempt under the policy's per-attempt timeout and the remaining
/// overall budget
async fn bounded<T, Fut>(policy: &RetryPolicy, started: Instant, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let limit = match (policy.attempt_timeout, remaining(started, policy.deadline)) {
        (Some(a), Some(r)) => Some(a.min(r)),
        (a, r) => a.or(r),
    };
    match limit {
        Some(limit) => timeout(limit, fut)
            .await
            .map_err(|_| AppError::timeout(format!("attempt exceeded {}ms", limit.as_millis())))?,
        None => fut.await,
    }
}

/// Retry `op` until it succeeds, the attempts run out, a non-recoverable error
/// shows up, or the deadline passes
pub async fn run_attempts<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> std::result::Result<T, AttemptError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut last_error = AppError::internal("no attempts were made");
    let mut attempts = 0;

    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            if let Some(left) = remaining(started, policy.deadline) {
                if left <= delay {
                    break;
                }
            }
            sleep(delay).await;
        }
        if remaining(started, policy.deadline).is_some_and(|left| left.is_zero()) {
            last_error = AppError::timeout("overall deadline reached");
            break;
        }

        attempts += 1;
        match bounded(policy, started, op(attempt)).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let recoverable = e.is_recoverable();
                last_error = e;
                if !recoverable {
                    break;
                }
            }
        }
    }

    Err(AttemptError { attempts, last_error })
}

/// Run every attempt and return each outcome in order
pub async fn collect_attempts<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Vec<Result<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut outcomes = Vec::with_capacity(policy.max_attempts);

    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if remaining(started, policy.deadline).is_some_and(|left| left.is_zero()) {
            outcomes.push(Err(AppError::timeout("overall deadline reached")));
            continue;
        }
        outcomes.push(bounded(policy, started, op(attempt)).await);
    }

    outcomes
}

/// Try each strategy in order and return the first success together with the
/// index of the strategy that produced it
pub async fn run_strategies<'a, S, T, F, Fut>(
    strategies: &'a [S],
    mut run: F,
) -> std::result::Result<(usize, T), AttemptError>
where
    F: FnMut(usize, &'a S) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = AppError::internal("no strategies available");
    let mut attempts = 0;

    for (index, strategy) in strategies.iter().enumerate() {
        attempts += 1;
        match run(index, strategy).await {
            Ok(value) => return Ok((index, value)),
            Err(e) => last_error = e,
        }
    }

    Err(AttemptError { attempts, last_error })
}
