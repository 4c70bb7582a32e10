//! Beacon node and validator client containers.

use std::{path::PathBuf, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{lighthouse, prysm};
use crate::{
    component::{ComponentHandle, EndpointKind, Scheme},
    config::ConsensusLayer,
    containers::{
        ContainerRole, GENERATED_DATA_DIR, LIGHTHOUSE_HTTP_PORT, PRYSM_NODE_RPC_PORT,
        PRYSM_QUERY_RPC_PORT, VALIDATOR_KEYS_DIR,
    },
    error::DevnetError,
    images::default_consensus_images,
    launcher::Launcher,
    runtime::ContainerSpec,
    unique_name,
    wait::LogStrategy,
};

/// Upper bound on how long a consensus client may take to log readiness.
const MAX_READY_TIMEOUT: Duration = Duration::from_secs(120);
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

fn ready_wait(pattern: &str, timeout: Duration) -> LogStrategy {
    LogStrategy::message(pattern)
        .with_timeout(timeout.min(MAX_READY_TIMEOUT))
        .with_poll_interval(READY_POLL_INTERVAL)
}

/// Endpoint of the beacon node a validator of `layer` connects to.
const fn validator_endpoint(layer: ConsensusLayer) -> EndpointKind {
    match layer {
        ConsensusLayer::Prysm => EndpointKind::BeaconRpc,
        ConsensusLayer::Lighthouse => EndpointKind::BeaconHttp,
    }
}

/// Beacon node driving the execution client over the engine API.
#[derive(Debug, Clone)]
pub struct BeaconNode {
    layer: ConsensusLayer,
    name: String,
    image: String,
    execution_endpoint: String,
    generated_data: PathBuf,
    networks: Vec<String>,
    wait_timeout: Duration,
    recreated: bool,
}

impl BeaconNode {
    /// Creates a beacon node following the started `execution` client.
    ///
    /// Fails if the execution client has no resolved engine endpoint.
    pub fn new(
        layer: ConsensusLayer,
        execution: &ComponentHandle,
        generated_data: impl Into<PathBuf>,
    ) -> Result<Self, DevnetError> {
        let name = match layer {
            ConsensusLayer::Prysm => unique_name("prysm-beacon-chain"),
            ConsensusLayer::Lighthouse => unique_name("lighthouse-beacon"),
        };
        Ok(Self {
            layer,
            name,
            image: default_consensus_images(layer).0.to_string(),
            execution_endpoint: execution.internal_url(EndpointKind::Engine)?,
            generated_data: generated_data.into(),
            networks: Vec::new(),
            wait_timeout: MAX_READY_TIMEOUT,
            recreated: false,
        })
    }

    /// Overrides the image.
    pub fn with_image(mut self, image: Option<String>) -> Self {
        if let Some(image) = image {
            self.image = image;
        }
        self
    }

    /// Sets the Docker networks.
    pub fn with_networks(mut self, networks: Vec<String>) -> Self {
        self.networks = networks;
        self
    }

    /// Sets how long the node may take to start. Capped at two minutes.
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Reattaches to the running container named `name`.
    pub fn with_existing_container(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.recreated = true;
        self
    }

    /// Container name.
    pub fn container_name(&self) -> &str {
        &self.name
    }

    /// Engine API URL the node is started with.
    pub fn execution_endpoint(&self) -> &str {
        &self.execution_endpoint
    }

    /// Command line for the configured client.
    pub fn command(&self) -> Vec<String> {
        match self.layer {
            ConsensusLayer::Prysm => prysm::beacon_command(&self.execution_endpoint),
            ConsensusLayer::Lighthouse => lighthouse::beacon_command(&self.execution_endpoint),
        }
    }

    /// Builds the container spec.
    pub fn container_spec(&self) -> ContainerSpec {
        let spec = ContainerSpec::new(&self.name, &self.image, ContainerRole::ConsensusLayer)
            .with_cmd(self.command())
            .with_mount(&self.generated_data, GENERATED_DATA_DIR)
            .with_networks(self.networks.clone())
            .with_reuse(true);
        match self.layer {
            ConsensusLayer::Prysm => spec
                .with_exposed_port(PRYSM_NODE_RPC_PORT)
                .with_exposed_port(PRYSM_QUERY_RPC_PORT)
                .with_wait(ready_wait(prysm::BEACON_READY, self.wait_timeout)),
            ConsensusLayer::Lighthouse => spec
                .with_entrypoint(lighthouse::ENTRYPOINT)
                .with_exposed_port(LIGHTHOUSE_HTTP_PORT)
                .with_wait(ready_wait(lighthouse::BEACON_READY, self.wait_timeout)),
        }
    }

    /// Starts the node and resolves the endpoints validators connect to.
    pub async fn start(
        &self,
        launcher: &Launcher,
        cancel: &CancellationToken,
    ) -> Result<ComponentHandle, DevnetError> {
        let container = launcher.launch(cancel, &self.container_spec()).await?;
        let mut handle = ComponentHandle::new(ContainerRole::ConsensusLayer, container, self.recreated);
        match self.layer {
            ConsensusLayer::Prysm => {
                handle.resolve(EndpointKind::BeaconRpc, PRYSM_NODE_RPC_PORT, Scheme::Bare).await?;
                handle.resolve(EndpointKind::BeaconHttp, PRYSM_QUERY_RPC_PORT, Scheme::Http).await?;
            }
            ConsensusLayer::Lighthouse => {
                handle.resolve(EndpointKind::BeaconHttp, LIGHTHOUSE_HTTP_PORT, Scheme::Http).await?;
                handle.resolve(EndpointKind::BeaconRpc, LIGHTHOUSE_HTTP_PORT, Scheme::Http).await?;
            }
        }
        info!(
            container = handle.container_name(),
            client = %self.layer,
            execution = %self.execution_endpoint,
            "Beacon node started"
        );
        Ok(handle)
    }
}

/// Validator client attesting and proposing through a beacon node.
#[derive(Debug, Clone)]
pub struct ValidatorClient {
    layer: ConsensusLayer,
    name: String,
    image: String,
    beacon_endpoint: String,
    generated_data: PathBuf,
    val_keys: PathBuf,
    networks: Vec<String>,
    wait_timeout: Duration,
    recreated: bool,
}

impl ValidatorClient {
    /// Creates a validator attached to the started `beacon` node.
    pub fn new(
        layer: ConsensusLayer,
        beacon: &ComponentHandle,
        generated_data: impl Into<PathBuf>,
        val_keys: impl Into<PathBuf>,
    ) -> Result<Self, DevnetError> {
        let name = match layer {
            ConsensusLayer::Prysm => unique_name("prysm-validator"),
            ConsensusLayer::Lighthouse => unique_name("lighthouse-validator"),
        };
        Ok(Self {
            layer,
            name,
            image: default_consensus_images(layer).1.to_string(),
            beacon_endpoint: beacon.internal_url(validator_endpoint(layer))?,
            generated_data: generated_data.into(),
            val_keys: val_keys.into(),
            networks: Vec::new(),
            wait_timeout: MAX_READY_TIMEOUT,
            recreated: false,
        })
    }

    /// Overrides the image.
    pub fn with_image(mut self, image: Option<String>) -> Self {
        if let Some(image) = image {
            self.image = image;
        }
        self
    }

    /// Sets the Docker networks.
    pub fn with_networks(mut self, networks: Vec<String>) -> Self {
        self.networks = networks;
        self
    }

    /// Sets how long the client may take to start. Capped at two minutes.
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Reattaches to the running container named `name`.
    pub fn with_existing_container(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.recreated = true;
        self
    }

    /// Container name.
    pub fn container_name(&self) -> &str {
        &self.name
    }

    /// Beacon node address the client is started with.
    pub fn beacon_endpoint(&self) -> &str {
        &self.beacon_endpoint
    }

    /// Command line for the configured client.
    pub fn command(&self) -> Vec<String> {
        match self.layer {
            ConsensusLayer::Prysm => prysm::validator_command(&self.beacon_endpoint),
            ConsensusLayer::Lighthouse => lighthouse::validator_command(&self.beacon_endpoint),
        }
    }

    /// Builds the container spec.
    pub fn container_spec(&self) -> ContainerSpec {
        let spec = ContainerSpec::new(&self.name, &self.image, ContainerRole::ConsensusValidator)
            .with_cmd(self.command())
            .with_mount(&self.generated_data, GENERATED_DATA_DIR)
            .with_mount(&self.val_keys, VALIDATOR_KEYS_DIR)
            .with_networks(self.networks.clone())
            .with_reuse(true);
        match self.layer {
            ConsensusLayer::Prysm => spec.with_wait(ready_wait(prysm::VALIDATOR_READY, self.wait_timeout)),
            ConsensusLayer::Lighthouse => spec
                .with_entrypoint(lighthouse::ENTRYPOINT)
                .with_wait(ready_wait(lighthouse::VALIDATOR_READY, self.wait_timeout)),
        }
    }

    /// Starts the client.
    pub async fn start(
        &self,
        launcher: &Launcher,
        cancel: &CancellationToken,
    ) -> Result<ComponentHandle, DevnetError> {
        let container = launcher.launch(cancel, &self.container_spec()).await?;
        info!(
            container = %self.name,
            client = %self.layer,
            beacon = %self.beacon_endpoint,
            "Validator client started"
        );
        Ok(ComponentHandle::new(ContainerRole::ConsensusValidator, container, self.recreated))
    }
}
