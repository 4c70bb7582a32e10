//! Builds a network from options and starts it in dependency order.
//!
//! [`NetworkBuilder::build`] resolves options against defaults or a saved
//! topology and validates them without touching any infrastructure.
//! [`EthereumNetwork::start`] then provisions host state (or reuses it),
//! starts the execution client, the beacon node and the validator, and
//! optionally waits for the first finalized epoch.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    component::{ComponentHandle, EndpointKind},
    config::{ChainConfig, ConsensusLayer, EthereumVersion, ExecutionLayer, NodeLogLevel},
    containers::ContainerRole,
    error::{DevnetError, PersistenceError, RuntimeError, Stage, ValidationError},
    images::{ImageRef, check_custom_image, infer_ethereum_version},
    l1::{BeaconNode, ExecutionClient, ExecutionNode, ValidatorClient, flavor_for},
    launcher::{Launcher, RetryPolicy},
    network::random_network_name,
    rpc::{FinalityWaiter, NetworkConnection},
    runtime::{ContainerRuntime, DockerRuntime},
    setup::{HostDirs, SetupSequence},
    topology::NetworkTopology,
};

fn failed(stage: Stage, err: DevnetError) -> DevnetError {
    error!(stage = %stage, error = %err, "Network startup failed");
    err.in_stage(stage)
}

/// Collects the options of a network.
///
/// Options left unset are filled with defaults for a fresh network, or taken
/// from the saved topology when reattaching. Options set explicitly always
/// win over the saved topology.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    ethereum_version: Option<EthereumVersion>,
    execution_layer: Option<ExecutionLayer>,
    consensus_layer: Option<ConsensusLayer>,
    chain_config: Option<ChainConfig>,
    custom_images: BTreeMap<ContainerRole, String>,
    node_log_level: Option<NodeLogLevel>,
    wait_for_finalization: Option<bool>,
    finalization_timeout: Option<Duration>,
    networks: Vec<String>,
    existing: Option<NetworkTopology>,
    existing_from_env: bool,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    retry_policies: Vec<Arc<dyn RetryPolicy>>,
}

impl NetworkBuilder {
    /// Creates a builder with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chain version.
    pub const fn with_ethereum_version(mut self, version: EthereumVersion) -> Self {
        self.ethereum_version = Some(version);
        self
    }

    /// Sets the execution client.
    pub const fn with_execution_layer(mut self, layer: ExecutionLayer) -> Self {
        self.execution_layer = Some(layer);
        self
    }

    /// Sets the consensus client. Only valid for merged chains.
    pub const fn with_consensus_layer(mut self, layer: ConsensusLayer) -> Self {
        self.consensus_layer = Some(layer);
        self
    }

    /// Sets chain parameters. Zero values are treated as unset.
    pub fn with_chain_config(mut self, config: ChainConfig) -> Self {
        self.chain_config = Some(config);
        self
    }

    /// Overrides the image of `role`.
    pub fn with_custom_image(mut self, role: ContainerRole, image: impl Into<String>) -> Self {
        self.custom_images.insert(role, image.into());
        self
    }

    /// Sets the execution client log level.
    pub const fn with_node_log_level(mut self, level: NodeLogLevel) -> Self {
        self.node_log_level = Some(level);
        self
    }

    /// Waits for the first finalized epoch before reporting the network ready.
    pub const fn with_wait_for_finalization(mut self, wait: bool) -> Self {
        self.wait_for_finalization = Some(wait);
        self
    }

    /// Bounds the finalization wait. Defaults to the chain's finalization wait.
    pub const fn with_finalization_timeout(mut self, timeout: Duration) -> Self {
        self.finalization_timeout = Some(timeout);
        self
    }

    /// Attaches containers to existing Docker networks instead of a new one.
    pub fn with_networks(mut self, networks: Vec<String>) -> Self {
        self.networks = networks;
        self
    }

    /// Reattaches to the network described by `topology`.
    pub fn with_existing_topology(mut self, topology: NetworkTopology) -> Self {
        self.existing = Some(topology);
        self
    }

    /// Reattaches to the topology named by `PRIVATE_ETHEREUM_NETWORK_CONFIG_PATH`.
    pub const fn with_existing_topology_from_env(mut self) -> Self {
        self.existing_from_env = true;
        self
    }

    /// Uses `runtime` instead of the local Docker daemon.
    pub fn with_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replaces the launcher's retry policies.
    pub fn with_retry_policies(mut self, policies: Vec<Arc<dyn RetryPolicy>>) -> Self {
        self.retry_policies = policies;
        self
    }

    /// Resolves and validates the options.
    ///
    /// Nothing is created until [`EthereumNetwork::start`] is called.
    pub fn build(self) -> Result<EthereumNetwork, DevnetError> {
        info!(stage = %Stage::Configuring, "Configuring Ethereum network");
        let finalization_timeout = self.finalization_timeout;
        let runtime = self.runtime.clone().unwrap_or_else(|| Arc::new(DockerRuntime::new()));
        let launcher = Launcher::new(runtime).with_policies(self.retry_policies.clone());

        let mut topology = self.resolve().map_err(|err| failed(Stage::Configuring, err))?;
        let (version, execution_layer) =
            validate(&mut topology).map_err(|err| failed(Stage::Validated, err.into()))?;

        info!(
            stage = %Stage::Validated,
            version = %version,
            execution = %execution_layer,
            consensus = ?topology.consensus_layer,
            reattach = topology.was_reattached,
            "Ethereum network validated"
        );
        let finalization_timeout =
            finalization_timeout.unwrap_or_else(|| topology.chain_config.default_finalization_wait_duration());
        Ok(EthereumNetwork {
            version,
            execution_layer,
            existing: if topology.was_reattached { topology.role_map() } else { BTreeMap::new() },
            topology,
            launcher,
            finalization_timeout,
        })
    }

    fn resolve(self) -> Result<NetworkTopology, DevnetError> {
        let existing = if self.existing_from_env { Some(NetworkTopology::from_env()?) } else { self.existing };

        let mut topology = match existing {
            Some(mut topology) => {
                topology.was_reattached = !topology.containers.is_empty();
                topology
            }
            None => NetworkTopology { chain_config: ChainConfig::unset(), ..Default::default() },
        };

        if let Some(version) = self.ethereum_version {
            topology.ethereum_version = Some(version);
        }
        if let Some(layer) = self.execution_layer {
            topology.execution_layer = Some(layer);
        }
        if let Some(layer) = self.consensus_layer {
            topology.consensus_layer = Some(layer);
        }
        if let Some(level) = self.node_log_level {
            topology.node_log_level = level;
        }
        if let Some(wait) = self.wait_for_finalization {
            topology.wait_for_finalization = wait;
        }
        if !self.networks.is_empty() {
            topology.docker_network_names = self.networks;
        }
        topology.custom_docker_images.extend(self.custom_images);

        if let Some(overrides) = &self.chain_config {
            topology.chain_config.apply_overrides(overrides);
        }
        if !topology.was_reattached {
            topology.chain_config.fill_in_missing_with_defaults();
            topology.chain_config.generate_genesis_timestamp();
        }

        if let Some(image) = topology.custom_docker_images.get(&ContainerRole::ExecutionLayer).cloned() {
            if topology.execution_layer.is_none() {
                let parsed = ImageRef::parse(&image)?;
                topology.execution_layer = Some(parsed.execution_layer().ok_or_else(|| {
                    ValidationError::UnsupportedImage {
                        image: image.clone(),
                        reason: "unknown execution client".to_string(),
                    }
                })?);
            }
            if topology.ethereum_version.is_none() {
                topology.ethereum_version = Some(infer_ethereum_version(&image)?);
            }
        }

        Ok(topology)
    }
}

/// Checks cross-field invariants. Returns the resolved version and execution client.
fn validate(topology: &mut NetworkTopology) -> Result<(EthereumVersion, ExecutionLayer), ValidationError> {
    let version = topology.ethereum_version.ok_or(ValidationError::MissingEthereumVersion)?;
    let execution = topology.execution_layer.ok_or(ValidationError::MissingExecutionLayer)?;

    match (version, topology.consensus_layer) {
        (EthereumVersion::Eth2, None) => return Err(ValidationError::MissingConsensusLayer),
        (EthereumVersion::Eth1, Some(consensus)) => {
            return Err(ValidationError::UnexpectedConsensusLayer(consensus.to_string()));
        }
        _ => {}
    }
    if version == EthereumVersion::Eth1 && execution == ExecutionLayer::Reth {
        return Err(ValidationError::Eth1NotSupportedByReth);
    }

    for (role, image) in &topology.custom_docker_images {
        check_custom_image(*role, image, execution, version, topology.consensus_layer)?;
    }

    topology.chain_config.validate(version)?;
    Ok((version, execution))
}

/// A validated network, ready to start.
#[derive(Debug)]
pub struct EthereumNetwork {
    version: EthereumVersion,
    execution_layer: ExecutionLayer,
    existing: BTreeMap<ContainerRole, String>,
    topology: NetworkTopology,
    launcher: Launcher,
    finalization_timeout: Duration,
}

impl EthereumNetwork {
    /// The resolved topology.
    pub const fn topology(&self) -> &NetworkTopology {
        &self.topology
    }

    /// Starts every component in dependency order.
    ///
    /// A failure aborts the pipeline and is wrapped with the stage it
    /// happened in. Containers already started are left running and host
    /// directories are kept for inspection.
    pub async fn start(mut self, cancel: &CancellationToken) -> Result<RunningNetwork, DevnetError> {
        let stage = if self.topology.was_reattached { Stage::Reattaching } else { Stage::FreshProvisioning };
        info!(stage = %stage, "Provisioning Ethereum network");
        let (networks, created_networks) = self.ensure_networks().await.map_err(|err| failed(stage, err))?;
        let dirs = self.provision(cancel, &networks).await.map_err(|err| failed(stage, err))?;

        info!(stage = %Stage::Started, "Starting Ethereum network components");
        let (execution, components) =
            self.start_components(cancel, &networks, dirs.as_ref()).await.map_err(|err| failed(Stage::Started, err))?;

        let handle = components
            .first()
            .ok_or_else(|| DevnetError::DependencyResolution {
                role: ContainerRole::ExecutionLayer,
                what: "started container".to_string(),
            })
            .map_err(|err| failed(Stage::Started, err))?;
        let connection = connection(handle, self.topology.chain_config.chain_id).map_err(|err| failed(Stage::Started, err))?;

        if self.topology.wait_for_finalization && !self.version.is_merged() {
            info!(version = %self.version, "Pre-merge chains do not finalize, skipping finalization wait");
        } else if self.topology.wait_for_finalization {
            info!(stage = %Stage::AwaitingFinalization, "Waiting for first finalized epoch");
            let url = connection.http_url().unwrap_or_default();
            FinalityWaiter::new(url)
                .map_err(|err| failed(Stage::AwaitingFinalization, err))?
                .wait(cancel, self.finalization_timeout)
                .await
                .map_err(|err| failed(Stage::AwaitingFinalization, err))?;
        } else {
            info!("Not waiting for chain to finalize first epoch");
        }

        info!(stage = %Stage::Ready, "{connection}");
        Ok(RunningNetwork {
            connection,
            execution,
            components,
            topology: self.topology,
            runtime: self.launcher.runtime().clone(),
            created_networks,
        })
    }

    /// Returns the networks to attach to and the ones created for this run.
    async fn ensure_networks(&mut self) -> Result<(Vec<String>, Vec<String>), DevnetError> {
        let runtime = self.launcher.runtime();
        if self.topology.docker_network_names.is_empty() {
            let name = random_network_name();
            runtime.create_network(&name).await.map_err(|source| DevnetError::Launch {
                container: format!("network {name}"),
                source,
            })?;
            self.topology.docker_network_names = vec![name.clone()];
            return Ok((vec![name.clone()], vec![name]));
        }

        for name in &self.topology.docker_network_names {
            runtime.create_network(name).await.map_err(|source| DevnetError::Launch {
                container: format!("network {name}"),
                source,
            })?;
        }
        Ok((self.topology.docker_network_names.clone(), Vec::new()))
    }

    /// Creates host directories and runs setup containers, or reuses the recorded ones.
    async fn provision(
        &mut self,
        cancel: &CancellationToken,
        networks: &[String],
    ) -> Result<Option<HostDirs>, DevnetError> {
        if !self.version.is_merged() {
            return Ok(None);
        }

        if self.topology.was_reattached {
            let dirs = self.topology.host_dirs().ok_or_else(|| DevnetError::DependencyResolution {
                role: ContainerRole::GenesisGenerator,
                what: "recorded host directories".to_string(),
            })?;
            info!(generated_data = %dirs.generated_data.display(), "Reusing host directories");
            return Ok(Some(dirs));
        }

        let dirs = HostDirs::create()?;
        self.topology.set_host_dirs(&dirs);
        info!(
            generated_data = %dirs.generated_data.display(),
            val_keys = %dirs.val_keys.display(),
            "Created host directories"
        );
        SetupSequence::new(&self.topology.chain_config, &dirs, networks, &self.topology.custom_docker_images)
            .run(&self.launcher, cancel)
            .await?;
        Ok(Some(dirs))
    }

    async fn start_components(
        &mut self,
        cancel: &CancellationToken,
        networks: &[String],
        dirs: Option<&HostDirs>,
    ) -> Result<(Box<dyn ExecutionClient>, Vec<ComponentHandle>), DevnetError> {
        let chain = self.topology.chain_config.clone();
        let images = self.topology.custom_docker_images.clone();
        let image = |role| images.get(&role).cloned();

        let mut execution = ExecutionNode::new(flavor_for(self.execution_layer), self.version, chain.clone())
            .with_image(image(ContainerRole::ExecutionLayer))
            .with_log_level(self.topology.node_log_level)
            .with_networks(networks.to_vec());
        if let Some(dirs) = dirs {
            execution = execution.with_generated_data(&dirs.generated_data);
        }
        if let Some(name) = self.existing.get(&ContainerRole::ExecutionLayer) {
            execution = execution.with_existing_container(name);
        }
        let mut execution: Box<dyn ExecutionClient> = Box::new(execution);
        execution.start(&self.launcher, cancel).await?;
        let execution_handle = execution.handle().cloned().ok_or_else(|| DevnetError::DependencyResolution {
            role: ContainerRole::ExecutionLayer,
            what: "started container".to_string(),
        })?;
        self.topology.record(ContainerRole::ExecutionLayer, execution_handle.container_name());
        let mut components = vec![execution_handle.clone()];

        let Some(dirs) = dirs else {
            return Ok((execution, components));
        };
        let consensus = self.topology.consensus_layer.ok_or(ValidationError::MissingConsensusLayer)?;

        let mut beacon = BeaconNode::new(consensus, &execution_handle, &dirs.generated_data)?
            .with_image(image(ContainerRole::ConsensusLayer))
            .with_networks(networks.to_vec())
            .with_wait_timeout(chain.default_wait_duration());
        if let Some(name) = self.existing.get(&ContainerRole::ConsensusLayer) {
            beacon = beacon.with_existing_container(name);
        }
        let beacon_handle = beacon.start(&self.launcher, cancel).await?;
        self.topology.record(ContainerRole::ConsensusLayer, beacon_handle.container_name());

        let mut validator = ValidatorClient::new(consensus, &beacon_handle, &dirs.generated_data, &dirs.val_keys)?
            .with_image(image(ContainerRole::ConsensusValidator))
            .with_networks(networks.to_vec())
            .with_wait_timeout(chain.default_wait_duration());
        if let Some(name) = self.existing.get(&ContainerRole::ConsensusValidator) {
            validator = validator.with_existing_container(name);
        }
        let validator_handle = validator.start(&self.launcher, cancel).await?;
        self.topology.record(ContainerRole::ConsensusValidator, validator_handle.container_name());
        components.extend([beacon_handle, validator_handle]);

        execution.wait_until_chain_is_ready(cancel, chain.default_wait_duration()).await?;
        Ok((execution, components))
    }
}

fn connection(execution: &ComponentHandle, chain_id: u64) -> Result<NetworkConnection, DevnetError> {
    Ok(NetworkConnection {
        public_http_urls: vec![execution.external_url(EndpointKind::Http)?],
        public_ws_urls: vec![execution.external_url(EndpointKind::Ws)?],
        private_http_urls: vec![execution.internal_url(EndpointKind::Http)?],
        private_ws_urls: vec![execution.internal_url(EndpointKind::Ws)?],
        chain_id,
    })
}

/// A started network. Tearing it down is up to the caller.
#[derive(Debug)]
pub struct RunningNetwork {
    connection: NetworkConnection,
    execution: Box<dyn ExecutionClient>,
    components: Vec<ComponentHandle>,
    topology: NetworkTopology,
    runtime: Arc<dyn ContainerRuntime>,
    created_networks: Vec<String>,
}

impl RunningNetwork {
    /// URLs of the execution client.
    pub const fn connection(&self) -> &NetworkConnection {
        &self.connection
    }

    /// Started components in start order.
    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }

    /// The component playing `role`.
    pub fn component(&self, role: ContainerRole) -> Option<&ComponentHandle> {
        self.components.iter().find(|component| component.role() == role)
    }

    /// The execution client.
    pub fn execution(&self) -> Option<&ComponentHandle> {
        self.execution.handle()
    }

    /// Topology of the running network, including started containers.
    pub const fn topology(&self) -> &NetworkTopology {
        &self.topology
    }

    /// Waits until the execution client imports blocks.
    pub async fn wait_until_chain_is_ready(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<(), DevnetError> {
        self.execution.wait_until_chain_is_ready(cancel, timeout).await
    }

    /// Saves the topology so another process can reattach.
    pub fn save(&self) -> Result<PathBuf, PersistenceError> {
        self.topology.save()
    }

    /// Terminates every component in reverse start order, then removes the
    /// networks created for this run.
    ///
    /// Every component is attempted; the first failure is returned.
    pub async fn terminate(self) -> Result<(), RuntimeError> {
        let mut first_error = None;
        for component in self.components.iter().rev() {
            if let Err(err) = component.terminate().await {
                error!(container = component.container_name(), error = %err, "Failed to terminate container");
                first_error.get_or_insert(err);
            }
        }
        for network in &self.created_networks {
            if let Err(err) = self.runtime.remove_network(network).await {
                error!(network, error = %err, "Failed to remove network");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
