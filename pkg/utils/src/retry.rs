use std::future::Future;
use std::time::Duration;

use pkg_constants::client::{RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_SECS};
use pkg_types::{Context, Result};
use tracing::warn;

/// Exponential backoff between attempts of a transient operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Whether another attempt may follow `attempts` completed ones.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, the policy
/// runs out of attempts, or `ctx` is done.
pub async fn retry_transient<T, F, Fut>(ctx: &Context, policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        let err = match ctx.run(op()).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };
        attempts += 1;
        if !policy.should_retry(attempts) {
            return Err(err);
        }

        let delay = policy.delay_for_attempt(attempts - 1);
        warn!(
            "Attempt {}/{} failed: {}, retrying in {:?}",
            attempts, policy.max_attempts, err, delay
        );
        ctx.run(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_grow_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(10));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let value = retry_transient(&Context::background(), &RetryPolicy::default(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::Resolve {
                    addr: "db:5432".to_string(),
                    message: "timeout".to_string(),
                })
            } else {
                Ok("connected")
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "connected");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_max_attempts(2);
        let err = retry_transient(&Context::background(), &policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::Request("connection reset".into()))
        })
        .await
        .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_transient(&Context::background(), &RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::bad_parameter("invalid address"))
        })
        .await
        .unwrap_err();
        assert!(err.is_bad_parameter());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_backoff() {
        let ctx = Context::background().with_timeout(Duration::from_millis(700));
        let policy = RetryPolicy::default().with_max_attempts(10);
        let err = retry_transient(&ctx, &policy, || async {
            Err::<(), _>(Error::Request("unavailable".into()))
        })
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
    }
}
