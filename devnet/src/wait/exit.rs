//! Exit code readiness check for one-shot containers.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Attempt, WaitStrategy, poll};
use crate::{error::WaitError, runtime::WaitTarget};

/// Waits until the container exits with the expected code.
///
/// A different exit code is not treated as a failure; the strategy keeps
/// polling until its deadline.
#[derive(Debug, Clone, Copy)]
pub struct ExitCodeStrategy {
    exit_code: i64,
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for ExitCodeStrategy {
    fn default() -> Self {
        Self { exit_code: 0, timeout: Duration::from_secs(120), poll_interval: Duration::from_secs(2) }
    }
}

impl ExitCodeStrategy {
    /// Waits for exit code 0 for up to two minutes.
    pub fn new() -> Self {
        Self::default()
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
impl WaitStrategy for ExitCodeStrategy {
    async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
        target: &dyn WaitTarget,
    ) -> Result<(), WaitError> {
        poll(cancel, self.timeout, self.poll_interval, || async {
            match target.state().await {
                Ok(state) if !state.running && state.exit_code == Some(self.exit_code) => Attempt::Ready,
                Ok(_) => Attempt::Pending,
                Err(err) => Attempt::Failed(err.into()),
            }
        })
        .await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
