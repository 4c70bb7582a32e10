//! WebSocket handshake readiness check.

use std::time::Duration;

use async_trait::async_trait;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{Attempt, WaitStrategy, poll};
use crate::{error::WaitError, runtime::WaitTarget};

/// Waits until a WebSocket handshake on a mapped port succeeds.
///
/// Each attempt opens a connection and closes it right away.
#[derive(Debug, Clone)]
pub struct WsStrategy {
    port: u16,
    path: String,
    timeout: Duration,
    retry_delay: Duration,
}

impl WsStrategy {
    /// Checks `ws://host:port/`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            path: "/".to_string(),
            timeout: Duration::from_secs(120),
            retry_delay: Duration::from_secs(10),
        }
    }

    /// Sets the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the overall deadline.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the delay between attempts.
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn check(&self, target: &dyn WaitTarget) -> Attempt {
        let (host, port) = match (target.host().await, target.host_port(self.port).await) {
            (Ok(host), Ok(port)) => (host, port),
            _ => return Attempt::Pending,
        };
        let url = format!("ws://{host}:{port}{}", self.path);
        match connect_async(url.as_str()).await {
            Ok((mut socket, _)) => {
                let _ = socket.close(None).await;
                Attempt::Ready
            }
            Err(err) => {
                trace!(container = target.name(), %url, error = %err, "WebSocket check failed");
                Attempt::Pending
            }
        }
    }
}

#[async_trait]
impl WaitStrategy for WsStrategy {
    async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
        target: &dyn WaitTarget,
    ) -> Result<(), WaitError> {
        poll(cancel, self.timeout, self.retry_delay, || self.check(target)).await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        containers::ContainerRole,
        test_utils::{MockContainer, serve_ws},
    };

    #[tokio::test]
    async fn test_handshake_succeeds() {
        let local = serve_ws().await;
        let target = MockContainer::new("geth", ContainerRole::ExecutionLayer).with_port(8546, local);
        let strategy = WsStrategy::new(8546).with_timeout(Duration::from_secs(2));
        assert_eq!(strategy.wait_until_ready(&CancellationToken::new(), &target).await, Ok(()));
    }

    #[tokio::test]
    async fn test_refused_connection_times_out() {
        let target = MockContainer::new("geth", ContainerRole::ExecutionLayer).with_port(8546, 1);
        let strategy = WsStrategy::new(8546)
            .with_timeout(Duration::from_millis(100))
            .with_retry_delay(Duration::from_millis(10));
        let result = strategy.wait_until_ready(&CancellationToken::new(), &target).await;
        assert!(matches!(result, Err(WaitError::Timeout(_))));
    }
}
