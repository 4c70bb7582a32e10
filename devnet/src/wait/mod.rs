//! Readiness checks run against freshly started containers.
//!
//! Every strategy polls a [`WaitTarget`] until a predicate holds, its own
//! deadline passes, or the caller cancels. Check failures inside the polling
//! loop are swallowed; only the final outcome is returned.

use std::{fmt, future::Future, time::Duration};

use async_trait::async_trait;
use tokio::time::{Instant, sleep, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::{error::WaitError, runtime::WaitTarget};

mod command;
pub use command::CommandStrategy;

mod exit;
pub use exit::ExitCodeStrategy;

mod http;
pub use http::HttpStrategy;

mod log;
pub use log::LogStrategy;

mod ws;
pub use ws::WsStrategy;

mod all;
pub use all::WaitForAll;

/// A polling readiness predicate.
///
/// Evaluating a strategy never changes the target, so it may be repeated or
/// abandoned at any point. A strategy instance serves one caller at a time.
#[async_trait]
pub trait WaitStrategy: Send + Sync + fmt::Debug {
    /// Waits until `target` is ready.
    ///
    /// Returns [`WaitError::Timeout`] once the strategy's deadline passes and
    /// [`WaitError::Cancelled`] when `cancel` fires.
    async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
        target: &dyn WaitTarget,
    ) -> Result<(), WaitError>;

    /// Overall deadline of this strategy.
    fn timeout(&self) -> Duration;
}

/// Outcome of one check.
#[derive(Debug)]
pub(crate) enum Attempt {
    Ready,
    Pending,
    Failed(WaitError),
}

/// Runs `check` every `interval` until it is ready or fails, `timeout`
/// elapses, or `cancel` fires. A check still running at the deadline is dropped.
pub(crate) async fn poll<F, Fut>(
    cancel: &CancellationToken,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            outcome = timeout_at(deadline, check()) => outcome,
        };
        match outcome {
            Err(_) => return Err(WaitError::Timeout(timeout)),
            Ok(Attempt::Ready) => return Ok(()),
            Ok(Attempt::Failed(err)) => return Err(err),
            Ok(Attempt::Pending) => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            _ = sleep_until(deadline) => return Err(WaitError::Timeout(timeout)),
            _ = sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_poll_returns_on_first_ready_check() {
        let calls = AtomicUsize::new(0);
        let result = poll(&CancellationToken::new(), Duration::from_secs(1), Duration::from_millis(1), || {
            let calls = &calls;
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 2 { Attempt::Ready } else { Attempt::Pending }
            }
        })
        .await;
        assert_eq!(result, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let timeout = Duration::from_millis(50);
        let result = poll(&CancellationToken::new(), timeout, Duration::from_millis(5), || async {
            Attempt::Pending
        })
        .await;
        assert_eq!(result, Err(WaitError::Timeout(timeout)));
    }

    #[tokio::test]
    async fn test_poll_stops_on_fatal_check() {
        let result = poll(&CancellationToken::new(), Duration::from_secs(1), Duration::from_millis(1), || async {
            Attempt::Failed(WaitError::NotRunning("exited".into()))
        })
        .await;
        assert_eq!(result, Err(WaitError::NotRunning("exited".into())));
    }

    #[tokio::test]
    async fn test_poll_honors_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = poll(&cancel, Duration::from_secs(10), Duration::from_secs(1), || async {
            Attempt::Pending
        })
        .await;
        assert_eq!(result, Err(WaitError::Cancelled));
    }

    #[tokio::test]
    async fn test_poll_abandons_hanging_check_at_deadline() {
        let timeout = Duration::from_millis(30);
        let result = poll(&CancellationToken::new(), timeout, Duration::from_millis(1), || async {
            std::future::pending::<Attempt>().await
        })
        .await;
        assert_eq!(result, Err(WaitError::Timeout(timeout)));
    }
}
