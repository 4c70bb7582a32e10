//! Error types for network provisioning.

use std::{fmt, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::containers::ContainerRole;

/// Error reported by the container runtime.
///
/// The runtime's message is kept verbatim because retry policies recognise
/// failures by substrings of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeError {
    message: String,
}

impl RuntimeError {
    /// Creates a runtime error from any displayable message.
    pub fn new(message: impl fmt::Display) -> Self {
        Self { message: message.to_string() }
    }

    /// Returns the runtime's message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the message contains `needle`, ignoring ASCII case.
    pub fn contains(&self, needle: &str) -> bool {
        self.message.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
    }
}

impl From<testcontainers::TestcontainersError> for RuntimeError {
    fn from(err: testcontainers::TestcontainersError) -> Self {
        Self::new(err)
    }
}

/// Failure of a single readiness check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The strategy deadline elapsed before the target became ready.
    #[error("not ready after {0:?}")]
    Timeout(Duration),
    /// The caller cancelled the wait.
    #[error("wait cancelled")]
    Cancelled,
    /// The container stopped running while it was being checked.
    #[error("container is not running: {0}")]
    NotRunning(String),
    /// The runtime could not answer a query about the target.
    #[error("target query failed: {0}")]
    Target(#[from] RuntimeError),
    /// The check itself failed in a way that cannot recover.
    #[error("readiness check failed: {0}")]
    Check(String),
}

/// Pre-flight rejection of a requested topology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No ethereum version could be determined.
    #[error("ethereum version is required")]
    MissingEthereumVersion,
    /// No execution layer could be determined.
    #[error("execution layer is required")]
    MissingExecutionLayer,
    /// Merged chains need a consensus client.
    #[error("consensus layer is required for eth2")]
    MissingConsensusLayer,
    /// Pre-merge chains run without a consensus client.
    #[error("consensus layer {0} is not allowed for eth1")]
    UnexpectedConsensusLayer(String),
    /// Reth can only run merged chains.
    #[error("eth1 is not supported by reth, use eth2")]
    Eth1NotSupportedByReth,
    /// A custom image reference could not be parsed.
    #[error("malformed docker image {image}: {reason}")]
    MalformedImage {
        /// The rejected image reference.
        image: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A custom image is outside the compatibility table.
    #[error("docker image {image} is not supported: {reason}")]
    UnsupportedImage {
        /// The rejected image reference.
        image: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The custom execution image belongs to a different client than the one requested.
    #[error(
        "custom docker image is a {image_layer} execution client, but execution layer was set to {requested}"
    )]
    MismatchedExecutionImage {
        /// Client inferred from the image.
        image_layer: String,
        /// Client explicitly requested.
        requested: String,
    },
    /// A funding address is not a 20-byte hex address.
    #[error("address {0} is not a valid hex address")]
    InvalidAddress(String),
    /// A chain parameter is out of range.
    #[error("invalid chain config: {0}")]
    ChainConfig(String),
    /// Unknown node log level.
    #[error("invalid node log level: {0}")]
    InvalidLogLevel(String),
    /// Reattachment was requested from the environment but the variable is unset.
    #[error("environment variable {0} is not set, but reattachment from env var was requested")]
    MissingTopologyEnvVar(&'static str),
}

/// Failure to read or write a persisted topology.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem failure.
    #[error("failed to access topology file {path}: {source}")]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid topology document.
    #[error("failed to parse topology file {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The topology could not be serialized.
    #[error("failed to serialize topology: {0}")]
    Serialize(#[source] serde_json::Error),
    /// A field required for reattachment is absent.
    #[error("topology file {path} is missing required field {field}")]
    MissingField {
        /// File that was loaded.
        path: PathBuf,
        /// Name of the absent field.
        field: &'static str,
    },
}

/// Stage of the build and start pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Options are being collected.
    Configuring,
    /// Cross-field invariants hold; nothing has been created yet.
    Validated,
    /// Creating networks, host directories and running setup containers.
    FreshProvisioning,
    /// Reusing recorded host state and containers.
    Reattaching,
    /// Execution, beacon and validator containers are being started.
    Started,
    /// Waiting for the first finalized epoch.
    AwaitingFinalization,
    /// The network is usable.
    Ready,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuring => "configuring",
            Self::Validated => "validation",
            Self::FreshProvisioning => "fresh provisioning",
            Self::Reattaching => "reattaching",
            Self::Started => "start",
            Self::AwaitingFinalization => "finalization",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Top-level error of the crate.
#[derive(Debug, Error)]
pub enum DevnetError {
    /// Requested topology is invalid. Never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Container could not be created or started after all retries.
    #[error("failed to start container {container}: {source}")]
    Launch {
        /// Name of the container.
        container: String,
        /// Last error seen by the launcher.
        #[source]
        source: RuntimeError,
    },
    /// Container started but never became ready.
    #[error("container {container} did not become ready within {timeout:?}")]
    ReadinessTimeout {
        /// Name of the container.
        container: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// Container failed its readiness check outright.
    #[error("container {container} failed its readiness check: {source}")]
    Readiness {
        /// Name of the container.
        container: String,
        /// Reason reported by the strategy.
        #[source]
        source: WaitError,
    },
    /// A later stage could not resolve an address from an earlier one.
    #[error("cannot resolve {what} of {role} component")]
    DependencyResolution {
        /// Role whose value was needed.
        role: ContainerRole,
        /// What could not be resolved.
        what: String,
    },
    /// Topology file is malformed or incomplete.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// Failure of a pipeline stage, wrapped with the stage name.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Stage that failed.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: Box<DevnetError>,
    },
    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
    /// Host filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Chain-level RPC failure.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// No block after genesis was finalized in time.
    #[error("chain did not finalize within {timeout:?}: {reason}")]
    FinalityTimeout {
        /// Deadline that elapsed.
        timeout: Duration,
        /// Last query failure, or why the chain was considered unfinalized.
        reason: String,
    },
}

impl DevnetError {
    /// Maps a failed readiness check of `container` to the matching variant.
    pub fn from_wait(container: impl Into<String>, err: WaitError) -> Self {
        let container = container.into();
        match err {
            WaitError::Timeout(timeout) => Self::ReadinessTimeout { container, timeout },
            WaitError::Cancelled => Self::Cancelled,
            source => Self::Readiness { container, source },
        }
    }

    /// Wraps `self` with the stage it occurred in.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            Self::Cancelled => Self::Cancelled,
            other => Self::Stage { stage, source: Box::new(other) },
        }
    }

    /// Returns the innermost error, skipping stage wrappers.
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the stage this error was raised in, if known.
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result alias for this crate.
pub type Result<T, E = DevnetError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::timeout(WaitError::Timeout(Duration::from_secs(1)))]
    #[case::not_running(WaitError::NotRunning("exited".into()))]
    #[case::check(WaitError::Check("refused".into()))]
    fn test_wait_error_display(#[case] error: WaitError) {
        assert!(!error.to_string().is_empty());
    }

    #[test]
    fn test_timeout_is_distinguished_from_crash() {
        let timeout = DevnetError::from_wait("geth", WaitError::Timeout(Duration::from_secs(3)));
        assert!(matches!(timeout, DevnetError::ReadinessTimeout { .. }));

        let crashed = DevnetError::from_wait("geth", WaitError::NotRunning("exited".into()));
        assert!(matches!(crashed, DevnetError::Readiness { .. }));
    }

    #[test]
    fn test_stage_wrapping_keeps_first_stage() {
        let err = DevnetError::Rpc("boom".into())
            .in_stage(Stage::Started)
            .in_stage(Stage::AwaitingFinalization);
        assert_eq!(err.stage(), Some(Stage::Started));
        assert!(matches!(err.root(), DevnetError::Rpc(_)));
        assert_eq!(err.to_string(), "start stage failed: rpc error: boom");
    }

    #[test]
    fn test_cancellation_is_never_wrapped() {
        let err = DevnetError::Cancelled.in_stage(Stage::Started);
        assert!(matches!(err, DevnetError::Cancelled));
    }

    #[test]
    fn test_runtime_error_contains_ignores_case() {
        let err = RuntimeError::new("Error response from daemon: No such image: foo:1");
        assert!(err.contains("no such image"));
        assert!(!err.contains("manifest unknown"));
    }
}
