//! Retry policy around the text analysis call

use crate::config::RetryConfig;
use crate::domain::{Ahd2FhirError, AhdError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Fixed wait plus capped, exponentially growing random jitter
///
/// The wait before attempt `n + 1` is `fixed_wait` plus a value drawn uniformly
/// from `[0, min(jitter_max, jitter_multiplier * 2^(n-1))]` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub fixed_wait: Duration,
    pub jitter_multiplier: f64,
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            fixed_wait: seconds(config.fixed_wait_seconds),
            jitter_multiplier: config.jitter_multiplier,
            jitter_max: seconds(config.jitter_max_seconds),
        }
    }

    /// `max_attempts` attempts without any wait in between
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            fixed_wait: Duration::ZERO,
            jitter_multiplier: 0.0,
            jitter_max: Duration::ZERO,
        }
    }

    /// Upper bound of the jitter after `attempt` failed attempts
    pub fn jitter_cap(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let exponential = self.jitter_multiplier * 2f64.powi(exponent);
        seconds(self.jitter_max.as_secs_f64().min(exponential))
    }

    /// Wait before the next attempt after `attempt` failed attempts
    pub fn delay(&self, attempt: u32) -> Duration {
        let cap = self.jitter_cap(attempt).as_secs_f64();
        let jitter = if cap > 0.0 {
            rand::thread_rng().gen_range(0.0..=cap)
        } else {
            0.0
        };
        self.fixed_wait + seconds(jitter)
    }

    /// Runs `operation` until it succeeds or the attempts are used up
    ///
    /// Every failure is retried; the last error is returned wrapped in
    /// [`Ahd2FhirError::TransientUpstream`].
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, AhdError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        tracing::error!(
                            attempts = attempt,
                            error = %e,
                            "Text analysis failed, giving up"
                        );
                        return Err(Ahd2FhirError::TransientUpstream {
                            attempts: attempt,
                            source: e,
                        });
                    }

                    let delay = self.delay(attempt);
                    crate::log_retry_attempt!(attempt, self.max_attempts, delay, e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Negative or non-finite values read as zero
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
