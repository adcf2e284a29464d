//! Synchronization primitives.
//!
//! Channels and async locks come from `tokio::sync`; cooperative cancellation
//! comes from `tokio_util`. The playback engine relies on three of these:
//!
//! - bounded `mpsc` channels for the producer → sink frame handoff
//!   (back-pressure instead of unbounded buffering)
//! - `broadcast` for observer notifications
//! - [`CancellationToken`] so `stop()` reaches the worker at its next
//!   suspension point

pub use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock};
pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

use std::future::Future;

/// Runs `future` until it completes or `token` is cancelled.
///
/// Returns `None` when cancellation won the race. The future is dropped at
/// that point, so any resources it owns are released before this returns.
///
/// # Examples
///
/// ```rust
/// use core_async::sync::{cancellable, CancellationToken};
/// use core_async::time::{sleep, Duration};
///
/// # core_async::runtime::block_on(async {
/// let token = CancellationToken::new();
/// token.cancel();
///
/// let outcome = cancellable(&token, async {
///     sleep(Duration::from_secs(60)).await;
/// })
/// .await;
/// assert!(outcome.is_none());
/// # });
/// ```
pub async fn cancellable<F>(token: &CancellationToken, future: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{sleep, Duration, Instant};

    #[tokio::test]
    async fn cancellable_returns_output_when_not_cancelled() {
        let token = CancellationToken::new();
        let result = cancellable(&token, async { 42 }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn cancellable_observes_cancellation_promptly() {
        let token = CancellationToken::new();
        let trigger = token.clone();

        crate::task::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = cancellable(&token, sleep(Duration::from_secs(30))).await;

        assert!(result.is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn child_token_follows_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        assert!(!child.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn bounded_channel_applies_back_pressure() {
        let (tx, mut rx) = mpsc::channel::<u32>(1);
        tx.send(1).await.unwrap();
        assert!(tx.try_send(2).is_err());

        assert_eq!(rx.recv().await, Some(1));
        assert!(tx.try_send(2).is_ok());
    }
}
