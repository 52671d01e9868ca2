use std::{future::Future, time::Duration};

use rand::Rng as _;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub(crate) const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(15 * 60);

/// Exponential backoff with randomized delays, bounded by total elapsed time
/// rather than by attempt count.
#[derive(Debug, Clone)]
pub(crate) struct ExponentialBackoff {
    pub(crate) initial_interval: Duration,
    pub(crate) multiplier: f64,
    /// Each delay is drawn from `interval * (1 ± randomization_factor)`.
    pub(crate) randomization_factor: f64,
    pub(crate) max_interval: Duration,
    pub(crate) max_elapsed: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval: Duration::from_secs(60),
            max_elapsed: DEFAULT_MAX_ELAPSED,
        }
    }
}

impl ExponentialBackoff {
    pub(crate) fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    /// Un-randomized interval before retry number `attempt` (0-indexed).
    fn interval_for_attempt(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let interval = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);

        interval.min(self.max_interval.as_secs_f64())
    }

    pub(crate) fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let interval = self.interval_for_attempt(attempt);

        let delay = if self.randomization_factor > 0.0 {
            let delta = interval * self.randomization_factor;
            rand::thread_rng().gen_range((interval - delta)..=(interval + delta))
        } else {
            interval
        };

        Duration::from_secs_f64(delay.max(0.0))
    }

    /// Run `operation` until it succeeds, fails with an error `is_transient`
    /// rejects, or the next delay would exceed the elapsed time budget.
    pub(crate) async fn retry<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_transient: P,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let err = match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        info!(
                            attempts,
                            elapsed_ms = start.elapsed().as_millis(),
                            "Succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !is_transient(&err) {
                debug!(attempts, error = %err, "Not retrying permanent failure");
                return Err(err);
            }

            let delay = self.delay_for_attempt(attempts - 1);

            if start.elapsed() + delay > self.max_elapsed {
                warn!(
                    attempts,
                    elapsed_ms = start.elapsed().as_millis(),
                    error = %err,
                    "Giving up after exhausting retry time budget"
                );
                return Err(err);
            }

            warn!(
                attempt = attempts,
                delay_ms = delay.as_millis(),
                error = %err,
                "Transient failure, will retry"
            );

            tokio::time::sleep(delay).await;
        }
    }
}
