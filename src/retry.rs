//! Retry of transient converter failures
//!
//! Only failures whose error reports [`IsRetryable`] are attempted again. For
//! conversions that is a timeout: a converter that rejected a record with a
//! non-zero exit will reject the same bytes the next time too.
//!
//! Delays grow geometrically from `initial_delay` by `backoff_multiplier`,
//! capped at `max_delay`. With `jitter` each sleep is stretched by a random
//! factor in `[1, 2]` so that records which timed out together do not all
//! restart the converter at the same instant.

use crate::config::RetryConfig;
use crate::error::IsRetryable;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Delay schedule derived from a [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
    remaining: u32,
}

impl Backoff {
    /// Schedule allowing `config.max_attempts` retries
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay,
            max: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            remaining: config.max_attempts,
        }
    }

    /// Retries left before the schedule is exhausted
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let base = self.next;
        self.next = scale(base, self.multiplier).unwrap_or(self.max).min(self.max);

        Some(if self.jitter { stretch(base) } else { base })
    }
}

/// `delay * factor`, or `None` when the product is not a valid duration
fn scale(delay: Duration, factor: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).ok()
}

fn stretch(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0..=2.0);
    scale(delay, factor).unwrap_or(delay)
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
///
/// The last error is returned unchanged.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + Display,
{
    let mut backoff = Backoff::new(config);
    let mut attempt: u32 = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "conversion succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            return Err(error);
        }
        let Some(delay) = backoff.next() else {
            tracing::debug!(%error, attempts = attempt, "retries exhausted");
            return Err(error);
        };

        tracing::warn!(
            %error,
            attempt,
            retries_left = backoff.remaining(),
            delay_ms = delay.as_millis() as u64,
            "transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
