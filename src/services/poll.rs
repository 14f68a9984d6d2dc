// Connection Manager - Bounded Polling
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Fixed-interval polling against a deadline.
//!
//! Every wait in the daemon (device discovery, activation, deactivation)
//! goes through [`poll_until`]. There is no cancellation besides the
//! deadline: a wait always resumes on the next tick.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Run `step` every `interval` until it breaks or `deadline` has elapsed.
///
/// The first step runs immediately. Returns `Some(value)` when a step
/// returned `ControlFlow::Break(value)`, `None` on timeout.
pub async fn poll_until<T, F, Fut>(interval: Duration, deadline: Duration, mut step: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<T>>,
{
    let start = Instant::now();
    loop {
        if let ControlFlow::Break(value) = step().await {
            return Some(value);
        }
        let elapsed = start.elapsed();
        if elapsed >= deadline {
            return None;
        }
        // The last tick lands on the deadline itself.
        sleep(interval.min(deadline - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const TICK: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_returns_first_break() {
        let calls = Cell::new(0);
        let result = poll_until(TICK, Duration::from_secs(5), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n == 3 {
                    ControlFlow::Break(n)
                } else {
                    ControlFlow::Continue(())
                }
            }
        })
        .await;

        assert_eq!(result, Some(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_times_out() {
        let calls = Cell::new(0);
        let result: Option<()> = poll_until(TICK, Duration::from_millis(20), || {
            calls.set(calls.get() + 1);
            async { ControlFlow::Continue(()) }
        })
        .await;

        assert_eq!(result, None);
        assert!(calls.get() >= 1);
    }

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let start = Instant::now();
        let result = poll_until(Duration::from_secs(60), Duration::from_secs(60), || async {
            ControlFlow::Break("ready")
        })
        .await;

        assert_eq!(result, Some("ready"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_last_check_reaches_deadline() {
        let deadline = Duration::from_millis(25);
        let start = Instant::now();
        let last_check = Cell::new(Duration::ZERO);
        let result: Option<()> = poll_until(Duration::from_millis(10), deadline, || {
            last_check.set(start.elapsed());
            async { ControlFlow::Continue(()) }
        })
        .await;

        assert_eq!(result, None);
        assert!(last_check.get() >= deadline);
    }

    #[tokio::test]
    async fn test_zero_deadline_checks_once() {
        let calls = Cell::new(0);
        let result: Option<()> = poll_until(TICK, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            async { ControlFlow::Continue(()) }
        })
        .await;

        assert_eq!(result, None);
        assert_eq!(calls.get(), 1);
    }
}
