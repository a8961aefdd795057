use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Bounded exponential backoff.
///
/// Attempts stop at whichever limit is hit first: `max_attempts` calls, or a
/// backoff sleep that would push total elapsed time past `max_elapsed`.
/// `retryable` decides which errors are worth another attempt at all.
pub struct RetryPolicy<E> {
    pub max_attempts: u32,
    pub max_elapsed: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> RetryPolicy<E> {
    /// Delay slept after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Retries ran out. Carries the error from the final attempt.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy gives up.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy<E>, mut op: F) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt >= max_attempts || !(policy.retryable)(&error) {
            return Err(Exhausted {
                attempts: attempt,
                last_error: error,
            });
        }

        let delay = policy.delay_after(attempt);
        if started.elapsed() + delay > policy.max_elapsed {
            tracing::warn!(
                attempt,
                "Retry budget of {:?} exhausted: {error}",
                policy.max_elapsed
            );
            return Err(Exhausted {
                attempts: attempt,
                last_error: error,
            });
        }

        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Attempt failed, retrying: {error}"
        );
        sleep(delay).await;
    }
}
