//! Retry policy for remote calls.
//!
//! The policy owns the attempt budget and the delay between attempts; the
//! caller supplies the operation and the error classification. Delays for
//! the exponential policy with base `b` are `2b, 4b, 8b, ...`, so the
//! default (3 attempts, 1s base) waits 2s then 4s.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, TransportError};

type BackoffFn = dyn Fn(u32) -> Duration + Send + Sync;

/// Bounded retry with a pluggable backoff function.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Arc<BackoffFn>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// `backoff(n)` is the delay slept after failed attempt `n` (1-based).
    pub fn new<F>(max_attempts: u32, backoff: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
        }
    }

    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self::new(max_attempts, move |attempt| {
            base.saturating_mul(1u32 << attempt.min(16))
        })
    }

    /// No delay between attempts. Intended for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, |_| Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }

    /// Run `op` until it succeeds, fails permanently, or the budget runs out.
    ///
    /// The final failure becomes [`Error::Network`] carrying the last
    /// transport error and the number of attempts made.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        what,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    return Err(Error::Network {
                        what: what.to_string(),
                        attempts: attempt,
                        source: err,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_secs(1))
    }
}
