//! Log pattern readiness check.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{Attempt, WaitStrategy, poll};
use crate::{error::WaitError, runtime::WaitTarget};

/// Waits until a pattern occurs in the container log a number of times.
///
/// The full log is re-read on every poll. A read error is tolerated unless the
/// log had already stopped growing, in which case the container is assumed
/// gone and the error is returned.
#[derive(Debug, Clone)]
pub struct LogStrategy {
    pattern: Regex,
    occurrences: usize,
    timeout: Duration,
    poll_interval: Duration,
}

impl LogStrategy {
    /// Waits for a literal message.
    pub fn message(message: &str) -> Self {
        Self::regex(Regex::new(&regex::escape(message)).expect("escaped literal is a valid regex"))
    }

    /// Waits for a regular expression.
    pub const fn regex(pattern: Regex) -> Self {
        Self {
            pattern,
            occurrences: 1,
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Sets how many matches are required.
    pub const fn with_occurrences(mut self, occurrences: usize) -> Self {
        self.occurrences = occurrences;
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

    /// Pattern being searched for.
    pub const fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

#[async_trait]
impl WaitStrategy for LogStrategy {
    async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
        target: &dyn WaitTarget,
    ) -> Result<(), WaitError> {
        let last_len = AtomicUsize::new(0);
        let stalled = AtomicBool::new(false);

        poll(cancel, self.timeout, self.poll_interval, || {
            let (last_len, stalled) = (&last_len, &stalled);
            async move {
                let logs = match target.logs().await {
                    Ok(logs) => logs,
                    Err(err) if stalled.load(Ordering::SeqCst) => return Attempt::Failed(err.into()),
                    Err(err) => {
                        trace!(container = target.name(), error = %err, "Log read failed, retrying");
                        return Attempt::Pending;
                    }
                };

                stalled.store(logs.len() == last_len.swap(logs.len(), Ordering::SeqCst), Ordering::SeqCst);
                let text = String::from_utf8_lossy(&logs);
                if self.pattern.find_iter(&text).count() >= self.occurrences {
                    Attempt::Ready
                } else {
                    Attempt::Pending
                }
            }
        })
        .await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
