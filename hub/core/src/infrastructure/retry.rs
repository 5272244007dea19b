// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Retry Executor
//!
//! Capped exponential backoff shared by the connection manager (reconnect
//! loop) and the adapter's HTTP step. Whether an error is worth retrying is
//! decided solely by [`HubError::is_retriable`]; the policy only shapes the
//! schedule.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::error::{ErrorCode, HubError};

/// Backoff schedule: `base × multiplier^n`, capped.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub multiplier: u32,
    pub cap: Duration,
    /// Total attempts including the first; `None` retries until cancelled.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Adapter HTTP policy: base 1 s, ×2, cap 10 s, bounded attempts.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2,
            cap: Duration::from_secs(10),
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// Reconnect policy: same curve, unbounded while the server stays
    /// enabled. Cancellation is the only exit.
    pub fn unbounded() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2,
            cap: Duration::from_secs(10),
            max_attempts: None,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.min(16));
        self.base.saturating_mul(factor).min(self.cap)
    }
}

fn cancelled_error() -> HubError {
    HubError::new(ErrorCode::ConnectionTimeout, "operation cancelled")
}

/// Run `op` under `policy`. `op` receives the 0-based attempt index. The
/// final error is returned unchanged once attempts are exhausted or the
/// error is not retriable.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, HubError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, HubError>>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(cancelled_error());
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let exhausted = policy
                    .max_attempts
                    .map(|max| attempt + 1 >= max)
                    .unwrap_or(false);
                if !err.is_retriable() || exhausted {
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retriable failure, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(cancelled_error()),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_curve_is_capped() {
        let policy = RetryPolicy::bounded(10);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(30), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result = run_with_retry(&RetryPolicy::bounded(4), &CancellationToken::new(), |_| {
            let calls = calls_in_op.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HubError::new(ErrorCode::UpstreamUnavailable, "503"))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result: Result<u32, _> =
            run_with_retry(&RetryPolicy::bounded(2), &CancellationToken::new(), |_| {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HubError::new(ErrorCode::UpstreamUnavailable, "503"))
                }
            })
            .await;
        assert_eq!(result.unwrap_err().code, ErrorCode::UpstreamUnavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retriable_errors_fail_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let result: Result<u32, _> =
            run_with_retry(&RetryPolicy::bounded(5), &CancellationToken::new(), |_| {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HubError::new(ErrorCode::TypeMismatch, "bad input"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_loop() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<u32, _> = run_with_retry(&RetryPolicy::unbounded(), &cancel, |_| async {
            Err(HubError::new(ErrorCode::ConnectionRefused, "nope"))
        })
        .await;
        assert_eq!(result.unwrap_err().code, ErrorCode::ConnectionTimeout);
    }
}
