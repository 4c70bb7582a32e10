//! Composite readiness check.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::WaitStrategy;
use crate::{error::WaitError, runtime::WaitTarget};

/// Runs several strategies one after another; ready once all are.
#[derive(Debug, Clone, Default)]
pub struct WaitForAll {
    strategies: Vec<Arc<dyn WaitStrategy>>,
    timeout: Option<Duration>,
}

impl WaitForAll {
    /// Creates an empty composite, which is ready at once.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a strategy.
    pub fn with(mut self, strategy: impl WaitStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Bounds the whole sequence in addition to each strategy's own deadline.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run_all(
        &self,
        cancel: &CancellationToken,
        target: &dyn WaitTarget,
    ) -> Result<(), WaitError> {
        for strategy in &self.strategies {
            strategy.wait_until_ready(cancel, target).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl WaitStrategy for WaitForAll {
    async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
        target: &dyn WaitTarget,
    ) -> Result<(), WaitError> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.run_all(cancel, target))
                .await
                .unwrap_or(Err(WaitError::Timeout(timeout))),
            None => self.run_all(cancel, target).await,
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout.unwrap_or_else(|| self.strategies.iter().map(|s| s.timeout()).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        containers::ContainerRole,
        test_utils::MockContainer,
        wait::{ExitCodeStrategy, LogStrategy},
    };

    #[tokio::test]
    async fn test_all_must_pass() {
        let target = MockContainer::new("geth", ContainerRole::ExecutionLayer).with_logs("started");
        let fast = |s: LogStrategy| s.with_timeout(Duration::from_millis(50)).with_poll_interval(Duration::from_millis(5));

        let both = WaitForAll::new().with(fast(LogStrategy::message("started"))).with(fast(LogStrategy::message("started")));
        assert_eq!(both.wait_until_ready(&CancellationToken::new(), &target).await, Ok(()));

        let one_missing = WaitForAll::new().with(fast(LogStrategy::message("started"))).with(fast(LogStrategy::message("synced")));
        assert!(one_missing.wait_until_ready(&CancellationToken::new(), &target).await.is_err());
    }

    #[tokio::test]
    async fn test_overall_timeout() {
        let target = MockContainer::new("geth", ContainerRole::ExecutionLayer);
        let composite = WaitForAll::new()
            .with(ExitCodeStrategy::new().with_poll_interval(Duration::from_millis(5)))
            .with_timeout(Duration::from_millis(40));
        assert_eq!(
            composite.wait_until_ready(&CancellationToken::new(), &target).await,
            Err(WaitError::Timeout(Duration::from_millis(40)))
        );
        assert_eq!(composite.timeout(), Duration::from_millis(40));
    }
}
