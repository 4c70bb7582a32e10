//! HTTP readiness check.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{Attempt, WaitStrategy, poll};
use crate::{error::WaitError, runtime::WaitTarget};

/// Waits until an HTTP request to a mapped port returns the expected status.
///
/// A container that stops running while being checked fails the wait at once.
#[derive(Debug, Clone)]
pub struct HttpStrategy {
    port: u16,
    path: String,
    method: Method,
    body: Option<serde_json::Value>,
    status: StatusCode,
    timeout: Duration,
    poll_interval: Duration,
}

impl HttpStrategy {
    /// Checks `GET /` on `port`, expecting `200 OK`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            path: "/".to_string(),
            method: Method::GET,
            body: None,
            status: StatusCode::OK,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Checks a JSON-RPC endpoint with a `POST` of `method`.
    pub fn json_rpc(port: u16, method: &str) -> Self {
        let body = serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": [] });
        Self { method: Method::POST, body: Some(body), ..Self::new(port) }
    }

    /// Sets the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the expected status code.
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
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

    async fn check(&self, client: &Client, target: &dyn WaitTarget) -> Attempt {
        match target.state().await {
            Ok(state) if !state.running => {
                return Attempt::Failed(WaitError::NotRunning(format!(
                    "{} exited with {:?}",
                    target.name(),
                    state.exit_code
                )));
            }
            Ok(_) => {}
            Err(err) => return Attempt::Failed(err.into()),
        }

        let (host, port) = match (target.host().await, target.host_port(self.port).await) {
            (Ok(host), Ok(port)) => (host, port),
            _ => return Attempt::Pending,
        };
        let url = format!("http://{host}:{port}{}", self.path);
        let mut request = client.request(self.method.clone(), &url);
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) if response.status() == self.status => Attempt::Ready,
            Ok(response) => {
                trace!(container = target.name(), %url, status = %response.status(), "Unexpected status");
                Attempt::Pending
            }
            Err(err) => {
                trace!(container = target.name(), %url, error = %err, "HTTP check failed");
                Attempt::Pending
            }
        }
    }
}

#[async_trait]
impl WaitStrategy for HttpStrategy {
    async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
        target: &dyn WaitTarget,
    ) -> Result<(), WaitError> {
        let client = Client::builder()
            .timeout(self.poll_interval.max(Duration::from_secs(1)))
            .build()
            .map_err(|err| WaitError::Check(err.to_string()))?;
        poll(cancel, self.timeout, self.poll_interval, || self.check(&client, target)).await
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
        runtime::ContainerState,
        test_utils::{MockContainer, serve_http},
    };

    fn strategy(port: u16) -> HttpStrategy {
        HttpStrategy::json_rpc(port, "eth_chainId")
            .with_timeout(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_reachable_endpoint_succeeds() {
        let local = serve_http().await;
        let target = MockContainer::new("geth", ContainerRole::ExecutionLayer).with_port(8545, local);
        assert_eq!(strategy(8545).wait_until_ready(&CancellationToken::new(), &target).await, Ok(()));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_times_out() {
        let target = MockContainer::new("geth", ContainerRole::ExecutionLayer).with_port(8545, 1);
        let result = strategy(8545).wait_until_ready(&CancellationToken::new(), &target).await;
        assert!(matches!(result, Err(WaitError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_stopped_container_fails_immediately() {
        let target = MockContainer::new("geth", ContainerRole::ExecutionLayer).with_state(ContainerState::exited(2));
        let result = strategy(8545).wait_until_ready(&CancellationToken::new(), &target).await;
        assert!(matches!(result, Err(WaitError::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_unexpected_status_keeps_polling() {
        let local = serve_http().await;
        let target = MockContainer::new("geth", ContainerRole::ExecutionLayer).with_port(8545, local);
        let result = strategy(8545)
            .with_status(StatusCode::NO_CONTENT)
            .wait_until_ready(&CancellationToken::new(), &target)
            .await;
        assert!(matches!(result, Err(WaitError::Timeout(_))));
    }
}
