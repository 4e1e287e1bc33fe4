//! Retry engine: runs an operation up to N times with backoff.
//!
//! - 最初に成功した attempt の結果をそのまま返す
//! - Permanent / 分類不能なエラーは即座に返す（リトライしない）
//! - Transient は attempt が残っていれば backoff 後にリトライ
//! - 使い切ったら最後のエラーを返す（握りつぶさない）
//!
//! attempt は厳密に直列。待機は `tokio::time::sleep` なので他のタスクを止めない。

use std::fmt;
use std::future::Future;

use super::RetryPolicy;
use crate::domain::{Classify, ErrorKind};

/// Why the engine stopped with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Still failing transiently when the attempt budget ran out.
    Exhausted,
    /// Classified permanent; never retried.
    Permanent,
    /// Not classifiable at all; never retried.
    Unclassified,
}

impl StopReason {
    /// Only an exhausted transient failure is worth a later manual retry.
    pub fn is_recoverable(self) -> bool {
        matches!(self, StopReason::Exhausted)
    }
}

/// Successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    /// Failed attempts before the successful one.
    pub failed_attempts: u32,
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// The last failure, unchanged.
    Failed {
        error: E,
        attempts: u32,
        stop: StopReason,
    },
    /// The pre-attempt check reported cancellation.
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Failed { attempts, .. } | RetryError::Cancelled { attempts } => *attempts,
        }
    }

    pub fn into_error(self) -> Option<E> {
        match self {
            RetryError::Failed { error, .. } => Some(error),
            RetryError::Cancelled { .. } => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Failed { error, .. } => error.fmt(f),
            RetryError::Cancelled { attempts } => {
                write!(f, "cancelled after {attempts} failed attempt(s)")
            }
        }
    }
}

/// Drives operations through a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    policy: RetryPolicy,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` up to `max_attempts` times. Values below one still run once.
    pub async fn run<T, E, F, Fut>(
        &self,
        max_attempts: u32,
        op: F,
    ) -> Result<Attempted<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        self.run_guarded(max_attempts, || async { false }, op).await
    }

    /// Like [`Retrier::run`], consulting `cancelled` before every attempt.
    pub async fn run_guarded<T, E, F, Fut, G, GFut>(
        &self,
        max_attempts: u32,
        mut cancelled: G,
        mut op: F,
    ) -> Result<Attempted<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnMut() -> GFut,
        GFut: Future<Output = bool>,
        E: Classify + fmt::Display,
    {
        let max_attempts = max_attempts.max(1);
        let mut failures = 0u32;

        loop {
            if cancelled().await {
                return Err(RetryError::Cancelled { attempts: failures });
            }

            let error = match op().await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        failed_attempts: failures,
                    });
                }
                Err(error) => error,
            };
            failures += 1;

            let stop = match error.error_kind() {
                None => Some(StopReason::Unclassified),
                Some(ErrorKind::Permanent) => Some(StopReason::Permanent),
                Some(ErrorKind::Transient) if failures >= max_attempts => {
                    Some(StopReason::Exhausted)
                }
                Some(ErrorKind::Transient) => None,
            };
            if let Some(stop) = stop {
                return Err(RetryError::Failed {
                    error,
                    attempts: failures,
                    stop,
                });
            }

            let delay = self.policy.next_delay(failures);
            tracing::warn!(
                attempt = failures,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient failure, retrying after backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Probe {
        Transient(u32),
        Permanent,
        Bare(&'static str),
    }

    impl fmt::Display for Probe {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Classify for Probe {
        fn error_kind(&self) -> Option<ErrorKind> {
            match self {
                Probe::Transient(_) => Some(ErrorKind::Transient),
                Probe::Permanent => Some(ErrorKind::Permanent),
                Probe::Bare(_) => None,
            }
        }
    }

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[tokio::test(start_paused = true)]
    async fn first_success_runs_once(#[case] max_attempts: u32) {
        let calls = counter();
        let retrier = Retrier::default();

        let out = retrier
            .run(max_attempts, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Probe>("done")
                }
            })
            .await
            .unwrap();

        assert_eq!(out.value, "done");
        assert_eq!(out.failed_attempts, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    #[tokio::test(start_paused = true)]
    async fn always_transient_runs_n_times_and_returns_last_failure(#[case] n: u32) {
        let calls = counter();
        let retrier = Retrier::default();

        let err = retrier
            .run(n, || {
                let calls = calls.clone();
                async move {
                    let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err::<(), _>(Probe::Transient(call))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), n);
        match err {
            RetryError::Failed {
                error,
                attempts,
                stop,
            } => {
                assert_eq!(error, Probe::Transient(n));
                assert_eq!(attempts, n);
                assert_eq!(stop, StopReason::Exhausted);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let calls = counter();
        let retrier = Retrier::default();

        let err = retrier
            .run(5, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Probe::Permanent)
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err,
            RetryError::Failed {
                stop: StopReason::Permanent,
                attempts: 1,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unclassifiable_value_fails_fast_unchanged() {
        let calls = counter();
        let retrier = Retrier::default();

        let err = retrier
            .run(3, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Probe::Bare("oops"))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.into_error(), Some(Probe::Bare("oops")));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let calls = counter();
        let retrier = Retrier::default();

        let _ = retrier
            .run(0, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Probe::Transient(1))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = counter();
        let retrier = Retrier::default();

        let out = retrier
            .run(3, || {
                let calls = calls.clone();
                async move {
                    let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if call < 3 {
                        Err(Probe::Transient(call))
                    } else {
                        Ok(call)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(out.value, 3);
        assert_eq!(out.failed_attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_the_policy_delay_between_attempts() {
        let retrier = Retrier::new(RetryPolicy::default_v1());
        let start = tokio::time::Instant::now();

        let _ = retrier
            .run(3, || async { Err::<(), _>(Probe::Transient(0)) })
            .await;

        // 2s + 4s; no wait after the last attempt
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_next_attempt() {
        let calls = counter();
        let retrier = Retrier::default();

        let err = retrier
            .run_guarded(
                5,
                || {
                    let calls = calls.clone();
                    async move { calls.load(Ordering::SeqCst) >= 1 }
                },
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(Probe::Transient(1))
                    }
                },
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RetryError::Cancelled { attempts: 1 }));
    }
}
