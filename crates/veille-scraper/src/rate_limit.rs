//! Upstream politeness: call spacing, a per-run call ceiling, and retry with
//! capped exponential backoff.
//!
//! Only [`FetchError::Transient`] is retried. Fatal errors, an exhausted
//! budget and cancellation are returned immediately.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

pub(crate) fn is_retriable(err: &FetchError) -> bool {
    matches!(err, FetchError::Transient(_))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), before jitter:
    /// `base * 2^(attempt-1)`, capped at `backoff_max`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(20);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max)
    }
}

/// Runs `operation`, retrying transient failures with jittered, capped
/// exponential backoff. Backoff sleeps end early on cancellation.
///
/// # Errors
///
/// The last error once retries are exhausted, any non-transient error, or
/// [`FetchError::Cancelled`].
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let capped = policy.delay_for(attempt);
                // ±25 % jitter so concurrent passes do not retry in lockstep.
                let delay = capped.mul_f64(rand::random::<f64>() * 0.5 + 0.75);
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient fetch error, retrying after backoff"
                );
                tokio::select! {
                    () = cancel.cancelled() => return Err(FetchError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Enforces a minimum interval between consecutive adapter invocations.
///
/// Callers queue on the lock, so concurrent theme passes are serialized at
/// the adapter boundary.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the next call is allowed, then record it.
    ///
    /// # Errors
    ///
    /// [`FetchError::Cancelled`] if the token fires while waiting.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            tokio::select! {
                () = cancel.cancelled() => return Err(FetchError::Cancelled),
                () = tokio::time::sleep_until(ready_at) => {}
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }
}

/// Per-run ceiling on adapter invocations, retries included.
#[derive(Debug)]
pub struct CallBudget {
    limit: usize,
    used: AtomicUsize,
}

impl CallBudget {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Reserve one call.
    ///
    /// # Errors
    ///
    /// [`FetchError::BudgetExhausted`] once the ceiling is reached.
    pub fn try_acquire(&self) -> Result<(), FetchError> {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| FetchError::BudgetExhausted { limit: self.limit })
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let p = RetryPolicy {
            max_retries: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(60),
        };
        assert_eq!(p.delay_for(1), Duration::from_secs(5));
        assert_eq!(p.delay_for(2), Duration::from_secs(10));
        assert_eq!(p.delay_for(3), Duration::from_secs(20));
        assert_eq!(p.delay_for(4), Duration::from_secs(40));
        assert_eq!(p.delay_for(5), Duration::from_secs(60));
        assert_eq!(p.delay_for(30), Duration::from_secs(60));
    }

    #[test]
    fn only_transient_is_retriable() {
        assert!(is_retriable(&FetchError::Transient("timeout".into())));
        assert!(!is_retriable(&FetchError::Fatal("400".into())));
        assert!(!is_retriable(&FetchError::BudgetExhausted { limit: 1 }));
        assert!(!is_retriable(&FetchError::Cancelled));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(policy(3), &CancellationToken::new(), || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::Transient("blocked".into()))
                } else {
                    Ok::<u32, FetchError>(7)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(policy(2), &CancellationToken::new(), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::Transient("timeout".into()))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(FetchError::Transient(_))));
    }

    #[tokio::test]
    async fn fatal_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(policy(3), &CancellationToken::new(), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::Fatal("malformed query".into()))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(FetchError::Fatal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let slow = RetryPolicy {
            max_retries: 3,
            backoff_base: Duration::from_secs(600),
            backoff_max: Duration::from_secs(600),
        };
        cancel.cancel();
        let result = retry_with_backoff(slow, &cancel, || async {
            Err::<u32, _>(FetchError::Transient("timeout".into()))
        })
        .await;
        assert_eq!(result, Err(FetchError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_spaces_consecutive_calls() {
        let throttle = Throttle::new(Duration::from_secs(20));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        throttle.wait(&cancel).await.unwrap();
        throttle.wait(&cancel).await.unwrap();
        throttle.wait(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(40));
    }

    #[test]
    fn budget_stops_at_limit() {
        let budget = CallBudget::new(2);
        assert!(budget.try_acquire().is_ok());
        assert!(budget.try_acquire().is_ok());
        assert_eq!(
            budget.try_acquire(),
            Err(FetchError::BudgetExhausted { limit: 2 })
        );
        assert_eq!(budget.used(), 2);
    }
}
