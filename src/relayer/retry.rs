// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-retry policy shared by every relayer call.

use std::future::Future;
use std::time::Duration;

/// Errors that know whether a second attempt could help.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Run `attempt`; if it fails with a transient error, wait `delay` and run it
/// exactly once more. Terminal errors and the second failure are returned
/// unchanged. There is never a third attempt.
pub async fn with_one_retry<T, E, F, Fut>(label: &str, delay: Duration, mut attempt: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match attempt().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            tracing::warn!(
                call = label,
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                "Relayer call failed, retrying once"
            );
            tokio::time::sleep(delay).await;
            attempt().await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Terminal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fail_then_succeed_returns_success() {
        let calls = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result = with_one_retry("test", Duration::from_secs(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(TestError::Transient)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_stop_after_second_attempt() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_one_retry("test", Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Transient) }
        })
        .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_one_retry("test", Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Terminal) }
        })
        .await;

        assert_eq!(result, Err(TestError::Terminal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
