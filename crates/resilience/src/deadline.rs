// crates/resilience/src/deadline.rs
//! Deadlines and cancellable waits

use crate::error::{ResilienceError, ResilienceResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a cancellable pause ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full pause elapsed
    Elapsed,
    /// The deadline was reached before the pause finished
    DeadlineReached,
    /// The cancellation token fired
    Cancelled,
}

/// A fixed point in time after which an operation gives up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Starts a deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// The total time budget
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time spent since the deadline started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left, zero once expired
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Returns true once the budget is used up
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Sleeps for `interval`, cut short by the deadline or by `cancel`
    pub async fn pause(&self, interval: Duration, cancel: &CancellationToken) -> WaitOutcome {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return WaitOutcome::DeadlineReached;
        }

        let (sleep_for, outcome) = if interval < remaining {
            (interval, WaitOutcome::Elapsed)
        } else {
            (remaining, WaitOutcome::DeadlineReached)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
            _ = tokio::time::sleep(sleep_for) => outcome,
        }
    }
}

/// Runs a future with a time budget
pub async fn with_timeout<F, T>(duration: Duration, operation: F) -> ResilienceResult<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, operation)
        .await
        .map_err(|_| ResilienceError::Timeout(duration))
}

/// Runs a future until it completes or `cancel` fires
pub async fn with_cancellation<F, T>(cancel: &CancellationToken, operation: F) -> ResilienceResult<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ResilienceError::Cancelled),
        value = operation => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let deadline = Deadline::after(Duration::from_secs(30));
        assert!(!deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_elapses() {
        let deadline = Deadline::after(Duration::from_secs(30));
        let token = CancellationToken::new();

        let outcome = deadline.pause(Duration::from_secs(3), &token).await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
        assert_eq!(deadline.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_capped_by_deadline() {
        let deadline = Deadline::after(Duration::from_secs(2));
        let token = CancellationToken::new();

        let outcome = deadline.pause(Duration::from_secs(3), &token).await;
        assert_eq!(outcome, WaitOutcome::DeadlineReached);
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancelled() {
        let deadline = Deadline::after(Duration::from_secs(30));
        let token = CancellationToken::new();
        token.cancel();

        let outcome = deadline.pause(Duration::from_secs(3), &token).await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout() {
        let ok = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(ok.ok(), Some(42));

        let slow = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            42
        })
        .await;
        assert!(matches!(slow, Err(ResilienceError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_with_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result = with_cancellation(&token, std::future::pending::<()>()).await;
        assert!(matches!(result, Err(ResilienceError::Cancelled)));
    }
}
