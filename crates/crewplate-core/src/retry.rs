use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{CoreError, Result};

/// Bounded exponential backoff for operations that fail with
/// [`CoreError::Transient`]. Any other error is returned immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts; handy in tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Blocking variant for store calls. A transient failure that survives
    /// every attempt is reported as [`CoreError::OperationFailed`].
    pub fn run_blocking<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(CoreError::Transient(msg)) if attempt < attempts => {
                    warn!("Transient failure (attempt {}/{}): {}", attempt, attempts, msg);
                    std::thread::sleep(self.delay_for(attempt));
                    attempt += 1;
                }
                Err(CoreError::Transient(msg)) => return Err(CoreError::OperationFailed(msg)),
                other => return other,
            }
        }
    }

    /// Async variant. Returns the last error unchanged so callers can pick
    /// their own terminal error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(CoreError::Transient(msg)) if attempt < attempts => {
                    warn!("Transient failure (attempt {}/{}): {}", attempt, attempts, msg);
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retried_then_reported_as_failed() {
        let mut calls = 0;
        let res: Result<()> = RetryPolicy::immediate(3).run_blocking(|| {
            calls += 1;
            Err(CoreError::Transient("busy".into()))
        });
        assert_eq!(calls, 3);
        assert!(matches!(res, Err(CoreError::OperationFailed(_))));
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let mut calls = 0;
        let res: Result<()> = RetryPolicy::immediate(3).run_blocking(|| {
            calls += 1;
            Err(CoreError::NotFound("crew"))
        });
        assert_eq!(calls, 1);
        assert!(matches!(res, Err(CoreError::NotFound("crew"))));
    }

    #[test]
    fn recovers_when_a_later_attempt_succeeds() {
        let mut calls = 0;
        let res = RetryPolicy::immediate(3).run_blocking(|| {
            calls += 1;
            if calls < 2 {
                Err(CoreError::Transient("busy".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(res.unwrap(), 2);
    }

    #[tokio::test]
    async fn async_variant_keeps_last_transient_error() {
        let mut calls = 0;
        let res: Result<()> = RetryPolicy::immediate(2)
            .run(|| {
                calls += 1;
                async { Err(CoreError::Transient("offline".into())) }
            })
            .await;
        assert_eq!(calls, 2);
        assert!(res.unwrap_err().is_transient());
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    }
}
