// src/poll/strategy.rs

use crate::config::PollConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Waits for a remote operation by polling with exponential backoff.
///
/// There is no attempt cap: polling continues until the check reports a
/// result or fails.
#[derive(Debug, Clone)]
pub struct PollStrategy {
    config: PollConfig,
}

impl PollStrategy {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    /// Call `check` until it yields `Some`, sleeping between attempts.
    /// Errors from `check` are returned immediately.
    pub async fn wait_until<F, Fut, T, E>(&self, mut check: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            if let Some(result) = check().await? {
                return Ok(result);
            }

            let backoff = self.calculate_backoff(attempt);
            debug!("Poll {} not ready, checking again in {:?}", attempt, backoff);

            sleep(backoff).await;
        }
    }

    /// Exponential backoff with jitter
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.initial_interval().as_millis() as u64;
        let max = self.config.max_interval().as_millis() as u64;

        // base * 2^(attempt - 1)
        let exponential =
            base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));

        let capped = exponential.min(max);

        // 0-25% jitter
        let jitter = (capped as f64 * rand::random::<f64>() * 0.25) as u64;

        Duration::from_millis(capped.saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> PollStrategy {
        PollStrategy::new(PollConfig {
            initial_interval_ms: 1,
            max_interval_ms: 5,
        })
    }

    #[tokio::test]
    async fn test_polls_until_ready() {
        let strategy = fast();
        let counter = AtomicU32::new(0);

        let result: Result<&str, &str> = strategy
            .wait_until(|| async {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Ok(None)
                } else {
                    Ok(Some("done"))
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_stops_polling() {
        let strategy = fast();
        let counter = AtomicU32::new(0);

        let result: Result<(), &str> = strategy
            .wait_until(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("job lookup failed")
            })
            .await;

        assert_eq!(result.unwrap_err(), "job lookup failed");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_saturates_at_extreme_intervals() {
        let strategy = PollStrategy::new(PollConfig {
            initial_interval_ms: u64::MAX,
            max_interval_ms: u64::MAX,
        });

        for attempt in [1, 2, 64] {
            assert_eq!(
                strategy.calculate_backoff(attempt),
                Duration::from_millis(u64::MAX)
            );
        }
    }

    proptest! {
        #[test]
        fn prop_backoff_within_bounds(
            base in 1u64..1_000,
            extra in 0u64..10_000,
            attempt in 1u32..64,
        ) {
            let max = base + extra;
            let strategy = PollStrategy::new(PollConfig {
                initial_interval_ms: base,
                max_interval_ms: max,
            });

            let backoff = strategy.calculate_backoff(attempt).as_millis() as u64;
            prop_assert!(backoff >= base);
            prop_assert!(backoff <= max + max / 4);
        }
    }
}
