//! Uniform retry policy for orchestrated steps.
//!
//! Every step gets the same number of additional attempts and the same
//! delay between them. A step may declare some of its errors terminal, such
//! as a sensor running out of time, and those end it at once.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::emit;
use crate::metrics::events::{StepCompleted, StepRetried, StepStatus};

/// How often, and how patiently, a failing step is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    delay: Duration,
}

/// Error returned when a step did not succeed.
#[derive(Debug)]
pub enum StepError<E> {
    /// Shutdown was requested before the step could succeed.
    Cancelled,
    /// Every attempt failed; carries the last error.
    Failed { attempts: u32, source: E },
}

impl<E> StepError<E> {
    /// Check if this is a cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The last error returned by the step, if it ran at all.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Cancelled => None,
            Self::Failed { source, .. } => Some(source),
        }
    }
}

impl<E: fmt::Display> fmt::Display for StepError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "step cancelled"),
            Self::Failed { attempts, source } => {
                write!(f, "step failed after {attempts} attempt(s): {source}")
            }
        }
    }
}

impl<E> std::error::Error for StepError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed { source, .. } => Some(source),
            Self::Cancelled => None,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// A policy that runs each step exactly once.
    pub fn never() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `attempt` until it succeeds, the attempts are used up, or shutdown
    /// is requested.
    ///
    /// `step` labels logs and metrics; `target` names the owning component.
    pub async fn run<T, E, F, Fut>(
        &self,
        step: &'static str,
        target: &str,
        shutdown: &CancellationToken,
        attempt: F,
    ) -> Result<T, StepError<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(step, target, shutdown, |_| true, attempt).await
    }

    /// Like [`RetryPolicy::run`], but errors for which `retryable` returns
    /// false end the step after the attempt that produced them.
    ///
    /// A failure observed after shutdown was requested is reported as
    /// [`StepError::Cancelled`].
    pub async fn run_if<T, E, R, F, Fut>(
        &self,
        step: &'static str,
        target: &str,
        shutdown: &CancellationToken,
        retryable: R,
        mut attempt: F,
    ) -> Result<T, StepError<E>>
    where
        E: fmt::Display,
        R: Fn(&E) -> bool,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let max_attempts = self.max_attempts();
        let mut number = 1;

        let result = loop {
            if shutdown.is_cancelled() {
                break Err(StepError::Cancelled);
            }

            match attempt(number).await {
                Ok(value) => break Ok(value),
                Err(e) if shutdown.is_cancelled() => {
                    info!(target = %target, step, error = %e, "Step interrupted by shutdown");
                    break Err(StepError::Cancelled);
                }
                Err(source) if number >= max_attempts || !retryable(&source) => {
                    break Err(StepError::Failed {
                        attempts: number,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        target = %target,
                        step,
                        attempt = number,
                        max_attempts,
                        error = %e,
                        "Step failed, retrying in {}s",
                        self.delay.as_secs()
                    );
                    emit!(StepRetried {
                        step,
                        target: target.to_string(),
                    });
                }
            }

            if shutdown
                .run_until_cancelled(tokio::time::sleep(self.delay))
                .await
                .is_none()
            {
                info!(target = %target, step, "Shutdown requested during retry delay");
                break Err(StepError::Cancelled);
            }
            number += 1;
        };

        let status = match &result {
            Ok(_) => StepStatus::Success,
            Err(StepError::Cancelled) => StepStatus::Cancelled,
            Err(StepError::Failed { .. }) => StepStatus::Failed,
        };
        emit!(StepCompleted {
            step,
            status,
            duration: start.elapsed(),
            target: target.to_string(),
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_max_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(1, Duration::ZERO).max_attempts(), 2);
        assert_eq!(RetryPolicy::new(u32::MAX, Duration::ZERO).max_attempts(), u32::MAX);
    }

    #[tokio::test]
    async fn test_succeeds_after_retry() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<u32, StepError<String>> = policy
            .run("load", "test", &CancellationToken::new(), |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let policy = RetryPolicy::new(1, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<(), StepError<String>> = policy
            .run("load", "test", &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom".to_string()) }
            })
            .await;

        match result {
            Err(StepError::Failed { attempts, source }) => {
                assert_eq!(attempts, 2);
                assert_eq!(source, "boom");
            }
            other => panic!("Expected Failed, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result: Result<(), StepError<String>> = RetryPolicy::never()
            .run("load", "test", &shutdown, |_| async { Ok(()) })
            .await;

        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_during_delay() {
        let shutdown = CancellationToken::new();
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result: Result<(), StepError<String>> = tokio::time::timeout(
            Duration::from_secs(5),
            policy.run("load", "test", &shutdown, |_| async { Err("boom".to_string()) }),
        )
        .await
        .expect("cancellation should cut the delay short");

        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_failure_after_shutdown_is_cancellation() {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        let calls = AtomicU32::new(0);

        let result: Result<(), StepError<String>> = RetryPolicy::new(3, Duration::ZERO)
            .run("wait_for_file", "test", &shutdown, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                trigger.cancel();
                async { Err("stopped waiting".to_string()) }
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_ends_step() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<(), StepError<String>> = policy
            .run_if(
                "wait_for_file",
                "test",
                &CancellationToken::new(),
                |e: &String| e != "timeout",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("timeout".to_string()) }
                },
            )
            .await;

        match result {
            Err(StepError::Failed { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("Expected Failed, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_step_error_display() {
        let err: StepError<String> = StepError::Failed {
            attempts: 2,
            source: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "step failed after 2 attempt(s): boom");
        assert_eq!(StepError::<String>::Cancelled.to_string(), "step cancelled");
    }
}
