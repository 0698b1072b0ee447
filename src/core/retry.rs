use crate::domain::model::RetrySettings;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// `base * 2^(attempt-1)` plus a uniform jitter in `[0, max_jitter]`.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        backoff.saturating_add(Duration::from_millis(jitter))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_jitter: Duration::from_millis(settings.max_jitter_ms),
        }
    }
}

/// Retry an async operation with exponential backoff and jitter.
///
/// Errors rejected by `is_retryable` are returned immediately, as is the
/// error of the last permitted attempt.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                tracing::warn!("Attempt {} failed: {}", attempt, e);

                if attempt >= max_attempts || !is_retryable(&e) {
                    return Err(e);
                }

                let delay = policy.delay_for(attempt);
                tracing::info!("Retrying in {}ms...", delay.as_millis());
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, String> = retry_with_backoff(
            &RetryPolicy::immediate(3),
            |_| true,
            |_| {
                let current = counter.fetch_add(1, Ordering::Relaxed);
                async move {
                    if current < 2 {
                        Err("overloaded".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;

        assert_eq!(res.unwrap(), 7);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, String> = retry_with_backoff(
            &RetryPolicy::immediate(3),
            |_| true,
            |attempt| {
                counter.fetch_add(1, Ordering::Relaxed);
                async move { Err(format!("attempt {}", attempt)) }
            },
        )
        .await;

        assert_eq!(res.unwrap_err(), "attempt 3");
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_fail_fast() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, String> = retry_with_backoff(
            &RetryPolicy::immediate(3),
            |e: &String| e != "unauthorized",
            |_| {
                counter.fetch_add(1, Ordering::Relaxed);
                async { Err("unauthorized".to_string()) }
            },
        )
        .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
            max_jitter: Duration::ZERO,
        };
        let started = tokio::time::Instant::now();

        let res: Result<(), String> =
            retry_with_backoff(&policy, |_| true, |_| async { Err("busy".to_string()) }).await;

        assert!(res.is_err());
        // 2s after the first failure, 4s after the second
        assert!(started.elapsed() >= Duration::from_millis(6000));
        assert!(started.elapsed() < Duration::from_millis(6100));
    }

    #[test]
    fn test_delay_includes_bounded_jitter() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        };

        for _ in 0..20 {
            let delay = policy.delay_for(2);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn test_policy_from_settings_never_allows_zero_attempts() {
        let policy = RetryPolicy::from(&RetrySettings {
            max_attempts: 0,
            base_delay_ms: 10,
            max_jitter_ms: 0,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(10));
    }
}
