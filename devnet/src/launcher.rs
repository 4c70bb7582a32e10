//! Fault tolerant container start with pluggable retry policies.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{DevnetError, RuntimeError},
    runtime::{ContainerRuntime, ContainerSpec, RunningContainer, WaitTarget},
};

/// Default number of passes over the retry policy chain.
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;

/// Platform forced by [`PlatformImageRetrier`].
pub const FALLBACK_PLATFORM: &str = "linux/x86_64";

/// Recovers from a failed container start.
///
/// A policy that does not recognise `last_error` must return it unchanged. A
/// policy that starts a container and then fails removes that container
/// before returning.
#[async_trait]
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Attempts to start the container described by `spec` after `last_error`.
    async fn retry(
        &self,
        runtime: &dyn ContainerRuntime,
        last_error: RuntimeError,
        spec: &ContainerSpec,
    ) -> Result<Arc<dyn RunningContainer>, RuntimeError>;
}

/// Starts `spec` and removes whatever it left behind if the start fails.
async fn start_clean(
    runtime: &dyn ContainerRuntime,
    spec: &ContainerSpec,
) -> Result<Arc<dyn RunningContainer>, RuntimeError> {
    runtime.remove(spec.name()).await?;
    match runtime.start(spec).await {
        Ok(container) => Ok(container),
        Err(err) => {
            if let Err(cleanup) = runtime.remove(spec.name()).await {
                warn!(container = spec.name(), error = %cleanup, "Failed to remove partially started container");
            }
            Err(err)
        }
    }
}

/// Retries under [`FALLBACK_PLATFORM`] when the image has no build for the
/// native platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformImageRetrier;

impl PlatformImageRetrier {
    const PATTERNS: [&'static str; 2] = ["no such image", "no matching manifest"];

    /// Returns true if `err` looks like a missing native image.
    pub fn recognizes(err: &RuntimeError) -> bool {
        Self::PATTERNS.iter().any(|pattern| err.contains(pattern))
    }
}

#[async_trait]
impl RetryPolicy for PlatformImageRetrier {
    fn name(&self) -> &'static str {
        "platform-image"
    }

    async fn retry(
        &self,
        runtime: &dyn ContainerRuntime,
        last_error: RuntimeError,
        spec: &ContainerSpec,
    ) -> Result<Arc<dyn RunningContainer>, RuntimeError> {
        if !Self::recognizes(&last_error) {
            return Err(last_error);
        }
        let spec = spec.clone().with_platform(FALLBACK_PLATFORM).with_reuse(false);
        start_clean(runtime, &spec).await
    }
}

/// Removes any container with the same name and starts a fresh one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveRetrier;

#[async_trait]
impl RetryPolicy for NaiveRetrier {
    fn name(&self) -> &'static str {
        "naive"
    }

    async fn retry(
        &self,
        runtime: &dyn ContainerRuntime,
        _last_error: RuntimeError,
        spec: &ContainerSpec,
    ) -> Result<Arc<dyn RunningContainer>, RuntimeError> {
        let spec = spec.clone().with_reuse(false);
        start_clean(runtime, &spec).await
    }
}

/// Returns the fallback chain used when none is configured.
pub fn default_retry_policies() -> Vec<Arc<dyn RetryPolicy>> {
    vec![Arc::new(PlatformImageRetrier), Arc::new(NaiveRetrier)]
}

/// Starts containers, retrying failed starts and then waiting for readiness.
///
/// The first start is a plain one. Each further attempt walks the whole
/// policy chain once, so a chain of `n` policies and `m` attempts performs at
/// most `1 + (m - 1) * n` starts. Readiness failures are never retried.
#[derive(Debug, Clone)]
pub struct Launcher {
    runtime: Arc<dyn ContainerRuntime>,
    policies: Vec<Arc<dyn RetryPolicy>>,
    max_attempts: usize,
}

impl Launcher {
    /// Creates a launcher with the default retry policies.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime, policies: default_retry_policies(), max_attempts: DEFAULT_RETRY_ATTEMPTS }
    }

    /// Replaces the retry policies. An empty chain restores the defaults.
    pub fn with_policies(mut self, policies: Vec<Arc<dyn RetryPolicy>>) -> Self {
        self.policies = if policies.is_empty() { default_retry_policies() } else { policies };
        self
    }

    /// Sets the number of attempts, counting the first start.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// The runtime containers are started on.
    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Creates and starts the container, retrying through the policy chain.
    pub async fn start_with_retry(
        &self,
        cancel: &CancellationToken,
        spec: &ContainerSpec,
    ) -> Result<Arc<dyn RunningContainer>, DevnetError> {
        let mut last_error = match self.start_once(cancel, spec).await? {
            Ok(container) => return Ok(container),
            Err(err) => err,
        };

        for attempt in 2..=self.max_attempts {
            for policy in &self.policies {
                if cancel.is_cancelled() {
                    return Err(DevnetError::Cancelled);
                }
                warn!(
                    container = spec.name(),
                    role = %spec.role(),
                    policy = policy.name(),
                    attempt,
                    error = %last_error,
                    "Container start failed, retrying"
                );
                let retried = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(DevnetError::Cancelled),
                    retried = policy.retry(self.runtime.as_ref(), last_error.clone(), spec) => retried,
                };
                match retried {
                    Ok(container) => {
                        info!(container = spec.name(), policy = policy.name(), "Container started after retry");
                        return Ok(container);
                    }
                    Err(err) => last_error = err,
                }
            }
        }

        error!(container = spec.name(), role = %spec.role(), error = %last_error, "Giving up on container start");
        Err(DevnetError::Launch { container: spec.name().to_string(), source: last_error })
    }

    async fn start_once(
        &self,
        cancel: &CancellationToken,
        spec: &ContainerSpec,
    ) -> Result<Result<Arc<dyn RunningContainer>, RuntimeError>, DevnetError> {
        debug!(container = spec.name(), image = spec.image(), role = %spec.role(), "Starting container");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DevnetError::Cancelled),
            started = self.runtime.start(spec) => Ok(started),
        }
    }

    /// Starts the container and blocks until its wait strategy reports ready.
    pub async fn launch(
        &self,
        cancel: &CancellationToken,
        spec: &ContainerSpec,
    ) -> Result<Arc<dyn RunningContainer>, DevnetError> {
        let container = self.start_with_retry(cancel, spec).await?;

        if let Some(wait) = spec.wait() {
            let target: &dyn WaitTarget = container.as_ref();
            if let Err(err) = wait.wait_until_ready(cancel, target).await {
                error!(
                    container = spec.name(),
                    role = %spec.role(),
                    error = %err,
                    "Container did not become ready"
                );
                return Err(DevnetError::from_wait(spec.name(), err));
            }
        }

        info!(container = spec.name(), role = %spec.role(), "Container ready");
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::{
        containers::ContainerRole,
        runtime::ContainerState,
        test_utils::{MockContainer, MockRuntime},
        wait::ExitCodeStrategy,
    };

    fn spec() -> ContainerSpec {
        ContainerSpec::new("geth-test", "ethereum/client-go:v1.14.3", ContainerRole::ExecutionLayer)
    }

    fn launcher(runtime: &Arc<MockRuntime>) -> Launcher {
        Launcher::new(runtime.clone())
    }

    /// Policy that fails every time without starting anything.
    #[derive(Debug)]
    struct Refuse;

    #[async_trait]
    impl RetryPolicy for Refuse {
        fn name(&self) -> &'static str {
            "refuse"
        }

        async fn retry(
            &self,
            runtime: &dyn ContainerRuntime,
            last_error: RuntimeError,
            spec: &ContainerSpec,
        ) -> Result<Arc<dyn RunningContainer>, RuntimeError> {
            runtime.start(spec).await.map_err(|_| last_error)
        }
    }

    #[tokio::test]
    async fn test_first_success_returns_immediately() {
        let runtime = Arc::new(MockRuntime::new());
        let container = launcher(&runtime).start_with_retry(&CancellationToken::new(), &spec()).await.unwrap();
        assert_eq!(container.name(), "geth-test");
        assert_eq!(runtime.start_count(), 1);
        assert!(runtime.removed().is_empty());
    }

    #[rstest]
    #[case::one_policy_three_attempts(1, 3)]
    #[case::two_policies_three_attempts(2, 3)]
    #[case::three_policies_two_attempts(3, 2)]
    #[case::single_attempt(2, 1)]
    #[tokio::test]
    async fn test_start_attempts_are_bounded(#[case] policies: usize, #[case] attempts: usize) {
        let runtime = Arc::new(MockRuntime::new());
        runtime.always_fail_starts(ContainerRole::ExecutionLayer, RuntimeError::new("daemon unavailable"));
        let chain: Vec<Arc<dyn RetryPolicy>> = (0..policies).map(|_| Arc::new(Refuse) as _).collect();

        let err = launcher(&runtime)
            .with_policies(chain)
            .with_max_attempts(attempts)
            .start_with_retry(&CancellationToken::new(), &spec())
            .await
            .unwrap_err();

        assert!(matches!(err, DevnetError::Launch { .. }));
        assert!(runtime.start_count() <= policies * attempts);
        assert_eq!(runtime.start_count(), 1 + (attempts - 1) * policies);
    }

    #[tokio::test]
    async fn test_returns_on_first_successful_retry() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.fail_next_starts(
            ContainerRole::ExecutionLayer,
            vec![RuntimeError::new("boom"), RuntimeError::new("boom again")],
        );

        launcher(&runtime).start_with_retry(&CancellationToken::new(), &spec()).await.unwrap();

        // plain start, then platform retrier passes through, naive retrier fails once, then succeeds
        assert_eq!(runtime.start_count(), 3);
    }

    #[tokio::test]
    async fn test_platform_retrier_ignores_unrecognized_error() {
        let runtime = MockRuntime::new();
        let original = RuntimeError::new("port is already allocated");
        let result = PlatformImageRetrier.retry(&runtime, original.clone(), &spec()).await;
        assert_eq!(result.unwrap_err(), original);
        assert_eq!(runtime.start_count(), 0);
        assert!(runtime.removed().is_empty());
    }

    #[tokio::test]
    async fn test_platform_retrier_forces_platform() {
        let runtime = MockRuntime::new();
        let err = RuntimeError::new("Error response from daemon: No such image: ethereum/client-go:v1.14.3");
        PlatformImageRetrier.retry(&runtime, err, &spec().with_reuse(true)).await.unwrap();

        let starts = runtime.starts();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].platform.as_deref(), Some(FALLBACK_PLATFORM));
        assert!(!starts[0].reuse);
        assert_eq!(runtime.removed(), vec!["geth-test".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_retry_cleans_up() {
        let runtime = MockRuntime::new();
        runtime.fail_next_starts(ContainerRole::ExecutionLayer, vec![RuntimeError::new("still broken")]);
        let err = NaiveRetrier.retry(&runtime, RuntimeError::new("broken"), &spec()).await.unwrap_err();
        assert_eq!(err, RuntimeError::new("still broken"));
        assert_eq!(runtime.removed(), vec!["geth-test".to_string(), "geth-test".to_string()]);
    }

    #[tokio::test]
    async fn test_launch_error_keeps_last_runtime_error() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.always_fail_starts(ContainerRole::ExecutionLayer, RuntimeError::new("No such image: x"));
        let err = launcher(&runtime).start_with_retry(&CancellationToken::new(), &spec()).await.unwrap_err();
        match err {
            DevnetError::Launch { container, source } => {
                assert_eq!(container, "geth-test");
                assert_eq!(source, RuntimeError::new("No such image: x"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_readiness_timeout_is_not_retried() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.set_container(
            ContainerRole::GenesisGenerator,
            MockContainer::template(ContainerRole::GenesisGenerator).with_state(ContainerState::exited(1)),
        );
        let spec = ContainerSpec::new("genesis", "gen:1", ContainerRole::GenesisGenerator).with_wait(
            ExitCodeStrategy::new().with_timeout(Duration::from_millis(50)).with_poll_interval(Duration::from_millis(5)),
        );

        let err = launcher(&runtime).launch(&CancellationToken::new(), &spec).await.unwrap_err();
        assert!(matches!(err, DevnetError::ReadinessTimeout { .. }));
        assert_eq!(runtime.start_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let runtime = Arc::new(MockRuntime::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = launcher(&runtime).launch(&cancel, &spec()).await.unwrap_err();
        assert!(matches!(err, DevnetError::Cancelled));
        assert_eq!(runtime.start_count(), 0);
    }
}
