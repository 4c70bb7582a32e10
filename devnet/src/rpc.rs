//! Connection details of a started network and chain queries over JSON-RPC.

use std::{fmt, time::Duration};

use alloy_eips::BlockNumberOrTag;
use alloy_provider::{Provider, RootProvider};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::DevnetError;

/// How often finality is polled.
pub const FINALITY_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// URLs test code uses to reach the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConnection {
    /// HTTP URLs reachable from the host.
    pub public_http_urls: Vec<String>,
    /// WebSocket URLs reachable from the host.
    pub public_ws_urls: Vec<String>,
    /// HTTP URLs reachable from other containers.
    pub private_http_urls: Vec<String>,
    /// WebSocket URLs reachable from other containers.
    pub private_ws_urls: Vec<String>,
    /// Chain id.
    pub chain_id: u64,
}

impl NetworkConnection {
    /// First public HTTP URL.
    pub fn http_url(&self) -> Option<&str> {
        self.public_http_urls.first().map(String::as_str)
    }

    /// First public WebSocket URL.
    pub fn ws_url(&self) -> Option<&str> {
        self.public_ws_urls.first().map(String::as_str)
    }
}

impl fmt::Display for NetworkConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Ethereum network (chain id {}):", self.chain_id)?;
        writeln!(f, "  Public HTTP:   {}", self.public_http_urls.join(", "))?;
        writeln!(f, "  Public WS:     {}", self.public_ws_urls.join(", "))?;
        writeln!(f, "  Private HTTP:  {}", self.private_http_urls.join(", "))?;
        write!(f, "  Private WS:    {}", self.private_ws_urls.join(", "))
    }
}

/// Polls the execution client until a block after genesis is finalized.
#[derive(Debug)]
pub struct FinalityWaiter {
    provider: RootProvider,
    poll_interval: Duration,
}

impl FinalityWaiter {
    /// Creates a waiter querying the HTTP endpoint at `url`.
    pub fn new(url: &str) -> Result<Self, DevnetError> {
        let url: url::Url = url.parse().map_err(|err| DevnetError::Rpc(format!("invalid url {url}: {err}")))?;
        Ok(Self { provider: RootProvider::new_http(url), poll_interval: FINALITY_POLL_INTERVAL })
    }

    /// Sets the poll interval.
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Number of the latest finalized block, if the chain has finalized anything.
    pub async fn finalized_block(&self) -> Result<Option<u64>, DevnetError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Finalized)
            .await
            .map_err(|err| DevnetError::Rpc(format!("failed to get finalized block: {err}")))?;
        Ok(block.map(|block| block.header.number))
    }

    /// Waits until a block after genesis is finalized.
    ///
    /// Query failures are retried until `timeout` elapses; the last one is
    /// reported if nothing was finalized in time. A query that hangs is cut
    /// off at the deadline.
    pub async fn wait(&self, cancel: &CancellationToken, timeout: Duration) -> Result<u64, DevnetError> {
        info!(timeout = ?timeout, "Waiting for chain to finalize first epoch");
        let deadline = Instant::now() + timeout;
        let mut last_error = None;
        loop {
            let queried = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DevnetError::Cancelled),
                queried = timeout_at(deadline, self.finalized_block()) => queried,
            };
            match queried {
                Err(_) => return Err(timed_out(timeout, last_error)),
                Ok(Ok(Some(number))) if number > 0 => {
                    info!(block = number, "Chain finalized first epoch");
                    return Ok(number);
                }
                Ok(Ok(finalized)) => debug!(finalized = ?finalized, "Chain has not finalized yet"),
                Ok(Err(err)) => {
                    debug!(error = %err, "Failed to query finalized block");
                    last_error = Some(err);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DevnetError::Cancelled),
                _ = sleep_until(deadline) => return Err(timed_out(timeout, last_error)),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

fn timed_out(timeout: Duration, last_error: Option<DevnetError>) -> DevnetError {
    let reason = last_error.map_or_else(|| "no block after genesis was finalized".to_string(), |err| err.to_string());
    DevnetError::FinalityTimeout { timeout, reason }
}
