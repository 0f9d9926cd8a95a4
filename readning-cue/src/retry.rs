//! Retry policy shared by every flaky call site
//!
//! One policy type drives both the phase-detection retries (few attempts,
//! seconds of backoff) and database lock contention (many attempts, bounded by
//! total wait). Backoff doubles after every failed attempt, capped at
//! `max_backoff`.

use std::future::Future;
use std::time::{Duration, Instant};

/// Attempt count, backoff schedule and optional total deadline
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Stop retrying once this much time has passed since the first attempt
    pub max_elapsed: Option<Duration>,
}

/// Why a retried operation gave up
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub attempts: u32,
    pub elapsed: Duration,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: Duration::from_secs(30),
            max_elapsed: None,
        }
    }

    /// Lock contention schedule: 10 ms doubling to 1 s, until `max_wait_ms` elapses
    pub fn lock_contention(max_wait_ms: u64) -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(1000),
            max_elapsed: Some(Duration::from_millis(max_wait_ms)),
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Delay before retry number `retry` (1 = first retry)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, returns a non-retryable error, or the
    /// policy is exhausted.
    pub async fn run<F, Fut, T, E, R>(
        &self,
        operation_name: &str,
        mut operation: F,
        is_retryable: R,
    ) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let start_time = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let elapsed = start_time.elapsed();
                    let give_up = !is_retryable(&err)
                        || attempt >= self.max_attempts
                        || self.max_elapsed.map_or(false, |limit| elapsed >= limit);

                    if give_up {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = elapsed.as_millis() as u64,
                            error = %err,
                            "Operation failed, giving up"
                        );
                        return Err(RetryFailure {
                            attempts: attempt,
                            elapsed,
                            last_error: err,
                        });
                    }

                    let mut backoff = self.backoff_for(attempt);
                    if let Some(limit) = self.max_elapsed {
                        backoff = backoff.min(limit.saturating_sub(elapsed));
                    }

                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Operation failed, will retry after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Retry a database operation while SQLite reports "database is locked",
/// for at most `max_wait_ms` in total. Other errors are returned at once.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> readning_common::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = readning_common::Result<T>>,
{
    RetryPolicy::lock_contention(max_wait_ms)
        .run(operation_name, |_| operation(), readning_common::Error::is_lock_error)
        .await
        .map_err(|failure| {
            if failure.last_error.is_lock_error() {
                readning_common::Error::Internal(format!(
                    "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                    failure.attempts,
                    failure.elapsed.as_millis(),
                    max_wait_ms
                ))
            } else {
                failure.last_error
            }
        })
}
