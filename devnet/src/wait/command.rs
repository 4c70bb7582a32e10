//! Readiness check that runs a command inside the container.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Attempt, WaitStrategy, poll};
use crate::{error::WaitError, runtime::WaitTarget};

/// Waits until a command executed in the container exits with the expected code.
#[derive(Debug, Clone)]
pub struct CommandStrategy {
    cmd: Vec<String>,
    exit_code: i64,
    timeout: Duration,
    poll_interval: Duration,
}

impl CommandStrategy {
    /// Runs `cmd`, expecting exit code 0.
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            exit_code: 0,
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Sets the expected exit code.
    pub const fn with_exit_code(mut self, exit_code: i64) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Sets the overall deadline.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the poll interval.
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl WaitStrategy for CommandStrategy {
    async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
        target: &dyn WaitTarget,
    ) -> Result<(), WaitError> {
        poll(cancel, self.timeout, self.poll_interval, || async {
            match target.exec(self.cmd.clone()).await {
                Ok(output) if output.exit_code == Some(self.exit_code) => Attempt::Ready,
                _ => Attempt::Pending,
            }
        })
        .await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{containers::ContainerRole, test_utils::MockContainer};

    #[tokio::test]
    async fn test_command_exit_code() {
        let target = MockContainer::new("beacon", ContainerRole::ConsensusLayer).with_exec_exit_code(0);
        let strategy = CommandStrategy::new(["true"]).with_poll_interval(Duration::from_millis(5));
        assert_eq!(strategy.wait_until_ready(&CancellationToken::new(), &target).await, Ok(()));

        let target = MockContainer::new("beacon", ContainerRole::ConsensusLayer).with_exec_exit_code(1);
        let strategy = strategy.with_timeout(Duration::from_millis(50));
        assert!(matches!(
            strategy.wait_until_ready(&CancellationToken::new(), &target).await,
            Err(WaitError::Timeout(_))
        ));
    }
}
