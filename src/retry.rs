//! Bounded retry for waiting on a dependency to become ready.
//!
//! The policy is data ([`RetryPolicy`]), the wait is a trait ([`Sleeper`]),
//! and the decision whether an error is worth retrying is a predicate passed
//! by the caller. Tests drive [`retry`] with a recording sleeper and never
//! actually wait.
//!
//! Sleeps happen only *between* attempts: a dependency that comes up on
//! attempt `k` costs `k - 1` waits, and one that never comes up costs
//! `max_attempts - 1` waits before [`RetryError::Exhausted`] is returned.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// How long to wait after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^(attempt-1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn exponential(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { base, max },
        }
    }

    /// Wait that follows failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let shift = attempt.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

/// Something that can wait. Production code uses [`TokioSleeper`].
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("attempt {attempt} failed with a non-retryable error: {error}")]
    Aborted { attempt: u32, error: E },
}

impl<E> RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    /// Number of attempts that were made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Aborted { attempt, .. } => *attempt,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted { error, .. } => error,
        }
    }
}

/// Run `op` until it succeeds, `should_retry` rejects its error, or the
/// policy runs out of attempts.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut should_retry: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: fmt::Display + fmt::Debug,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                tracing::info!("({}/{}) attempt succeeded", attempt, max_attempts);
                return Ok(value);
            }
            Err(error) => {
                if !should_retry(&error) {
                    return Err(RetryError::Aborted { attempt, error });
                }
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "({}/{}) not ready, retrying in {:?}: {}",
                    attempt,
                    max_attempts,
                    delay,
                    error
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(attempts, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn succeeds_on_attempt_k_with_k_calls() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result = retry(
            &policy(10),
            &sleeper,
            |_: &&str| true,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt >= 4 {
                        Ok(attempt)
                    } else {
                        Err("connection refused")
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let waits = sleeper.waits.lock().unwrap();
        assert_eq!(waits.len(), 3);
        assert!(waits.iter().all(|d| *d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn first_attempt_success_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let result: Result<u32, RetryError<&str>> =
            retry(&policy(3), &sleeper, |_| true, |a| async move { Ok(a) }).await;
        assert_eq!(result.unwrap(), 1);
        assert!(sleeper.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn never_ready_makes_exactly_n_attempts() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let err = retry(
            &policy(10),
            &sleeper,
            |_: &&str| true,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("connection refused") }
            },
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(err.attempts(), 10);
        assert!(matches!(err, RetryError::Exhausted { .. }));
        assert_eq!(sleeper.waits.lock().unwrap().len(), 9);
        assert_eq!(err.into_inner(), "connection refused");
    }

    #[tokio::test]
    async fn non_retryable_error_aborts_immediately() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let err = retry(
            &policy(10),
            &sleeper,
            |e: &&str| *e != "bad password",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("bad password") }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RetryError::Aborted { attempt: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let sleeper = RecordingSleeper::default();
        let err = retry(&policy(0), &sleeper, |_: &&str| true, |_| async {
            Err::<(), _>("down")
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts(), 1);
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let p = RetryPolicy::exponential(10, Duration::from_secs(1), Duration::from_secs(8));
        assert_eq!(p.delay_for(1), Duration::from_secs(1));
        assert_eq!(p.delay_for(2), Duration::from_secs(2));
        assert_eq!(p.delay_for(3), Duration::from_secs(4));
        assert_eq!(p.delay_for(4), Duration::from_secs(8));
        assert_eq!(p.delay_for(9), Duration::from_secs(8));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let p = policy(3);
        assert_eq!(p.delay_for(1), p.delay_for(3));
    }
}
