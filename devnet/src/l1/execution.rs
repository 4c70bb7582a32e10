//! Execution client node shared by every client kind.

use std::{fmt, path::PathBuf, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    component::{ComponentHandle, EndpointKind, Scheme},
    config::{ChainConfig, EthereumVersion, ExecutionLayer, NodeLogLevel},
    containers::{
        ContainerRole, EXECUTION_ENGINE_PORT, EXECUTION_HTTP_PORT, EXECUTION_WS_PORT,
        GENERATED_DATA_DIR,
    },
    error::{DevnetError, WaitError},
    images::default_execution_image,
    launcher::Launcher,
    runtime::{ContainerSpec, WaitTarget},
    unique_name,
    wait::{HttpStrategy, LogStrategy, WaitForAll, WaitStrategy, WsStrategy},
};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(120);
const CHAIN_READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a client needs to render its command line.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// Pre-merge or merged chain.
    pub version: EthereumVersion,
    /// Chain parameters.
    pub chain: &'a ChainConfig,
    /// Client log level.
    pub log_level: NodeLogLevel,
}

/// Knowledge specific to one execution client.
///
/// A client only supplies its command line and the log lines that mark it as
/// started and as following the chain; starting, readiness and endpoint
/// resolution are shared by [`ExecutionNode`].
pub trait ExecutionFlavor: Send + Sync + fmt::Debug {
    /// Client kind.
    fn layer(&self) -> ExecutionLayer;

    /// Entrypoint override, if the image's default is not used.
    fn entrypoint(&self, _version: EthereumVersion) -> Option<&'static str> {
        None
    }

    /// Command line.
    fn command(&self, ctx: &ExecutionContext<'_>) -> Vec<String>;

    /// Log line printed once RPC is served.
    fn ready_pattern(&self, version: EthereumVersion) -> &'static str;

    /// Log line printed once the client imports blocks.
    fn chain_ready_pattern(&self, version: EthereumVersion) -> &'static str;

    /// Port the WebSocket endpoint is served on.
    fn ws_port(&self) -> u16 {
        EXECUTION_WS_PORT
    }

    /// Factor applied to the chain ready timeout for slow starting clients.
    fn chain_ready_timeout_factor(&self) -> u32 {
        1
    }
}

/// An execution client as seen by the network builder.
#[async_trait]
pub trait ExecutionClient: Send + Sync + fmt::Debug {
    /// Client kind.
    fn layer(&self) -> ExecutionLayer;

    /// Container name.
    fn container_name(&self) -> &str;

    /// The container spec this client starts with.
    fn container_spec(&self) -> Result<ContainerSpec, DevnetError>;

    /// Starts the container, waits until RPC is served and resolves endpoints.
    async fn start(&mut self, launcher: &Launcher, cancel: &CancellationToken) -> Result<(), DevnetError>;

    /// Waits until the client imports blocks.
    async fn wait_until_chain_is_ready(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<(), DevnetError>;

    /// Handle of the started client.
    fn handle(&self) -> Option<&ComponentHandle>;
}

/// An execution client container of any flavor.
#[derive(Debug)]
pub struct ExecutionNode {
    flavor: Box<dyn ExecutionFlavor>,
    name: String,
    image: String,
    version: EthereumVersion,
    chain: ChainConfig,
    log_level: NodeLogLevel,
    generated_data: Option<PathBuf>,
    networks: Vec<String>,
    recreated: bool,
    handle: Option<ComponentHandle>,
}

impl ExecutionNode {
    /// Creates a node for `flavor` using its default image.
    pub fn new(flavor: Box<dyn ExecutionFlavor>, version: EthereumVersion, chain: ChainConfig) -> Self {
        let layer = flavor.layer();
        Self {
            name: unique_name(layer.as_str()),
            image: default_execution_image(layer, version).to_string(),
            flavor,
            version,
            chain,
            log_level: NodeLogLevel::default(),
            generated_data: None,
            networks: Vec::new(),
            recreated: false,
            handle: None,
        }
    }

    /// Overrides the image.
    pub fn with_image(mut self, image: Option<String>) -> Self {
        if let Some(image) = image {
            self.image = image;
        }
        self
    }

    /// Sets the client log level.
    pub const fn with_log_level(mut self, level: NodeLogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Mounts the generated genesis data. Required for merged chains.
    pub fn with_generated_data(mut self, dir: impl Into<PathBuf>) -> Self {
        self.generated_data = Some(dir.into());
        self
    }

    /// Sets the Docker networks.
    pub fn with_networks(mut self, networks: Vec<String>) -> Self {
        self.networks = networks;
        self
    }

    /// Reattaches to the running container named `name`.
    pub fn with_existing_container(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.recreated = true;
        self
    }

    /// Image in `name:tag` form.
    pub fn image(&self) -> &str {
        &self.image
    }

    fn readiness(&self) -> WaitForAll {
        let log = LogStrategy::message(self.flavor.ready_pattern(self.version))
            .with_timeout(STARTUP_TIMEOUT)
            .with_poll_interval(CHAIN_READY_POLL_INTERVAL);
        WaitForAll::new()
            .with(log)
            .with(HttpStrategy::json_rpc(EXECUTION_HTTP_PORT, "eth_chainId").with_timeout(STARTUP_TIMEOUT))
            .with(
                WsStrategy::new(self.flavor.ws_port())
                    .with_timeout(STARTUP_TIMEOUT)
                    .with_retry_delay(Duration::from_secs(1)),
            )
            .with_timeout(STARTUP_TIMEOUT)
    }

    fn chain_ready_strategy(&self, timeout: Duration) -> Result<LogStrategy, DevnetError> {
        let pattern = self.flavor.chain_ready_pattern(self.version);
        let regex = Regex::new(pattern).map_err(|err| DevnetError::Readiness {
            container: self.name.clone(),
            source: WaitError::Check(format!("invalid chain ready pattern {pattern}: {err}")),
        })?;
        Ok(LogStrategy::regex(regex)
            .with_timeout(timeout * self.flavor.chain_ready_timeout_factor())
            .with_poll_interval(CHAIN_READY_POLL_INTERVAL))
    }
}

#[async_trait]
impl ExecutionClient for ExecutionNode {
    fn layer(&self) -> ExecutionLayer {
        self.flavor.layer()
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn container_spec(&self) -> Result<ContainerSpec, DevnetError> {
        let ctx = ExecutionContext { version: self.version, chain: &self.chain, log_level: self.log_level };
        let mut spec = ContainerSpec::new(&self.name, &self.image, ContainerRole::ExecutionLayer)
            .with_exposed_port(EXECUTION_HTTP_PORT)
            .with_exposed_port(EXECUTION_WS_PORT)
            .with_cmd(self.flavor.command(&ctx))
            .with_networks(self.networks.clone())
            .with_startup_timeout(STARTUP_TIMEOUT)
            .with_reuse(true)
            .with_wait(self.readiness());
        if let Some(entrypoint) = self.flavor.entrypoint(self.version) {
            spec = spec.with_entrypoint(entrypoint);
        }
        if self.version.is_merged() {
            let dir = self.generated_data.as_ref().ok_or_else(|| DevnetError::DependencyResolution {
                role: ContainerRole::GenesisGenerator,
                what: "generated data directory".to_string(),
            })?;
            spec = spec.with_exposed_port(EXECUTION_ENGINE_PORT).with_mount(dir, GENERATED_DATA_DIR);
        }
        Ok(spec)
    }

    async fn start(&mut self, launcher: &Launcher, cancel: &CancellationToken) -> Result<(), DevnetError> {
        let spec = self.container_spec()?;
        let container = launcher.launch(cancel, &spec).await?;

        let mut handle = ComponentHandle::new(ContainerRole::ExecutionLayer, container, self.recreated);
        handle.resolve(EndpointKind::Http, EXECUTION_HTTP_PORT, Scheme::Http).await?;
        handle.resolve(EndpointKind::Ws, self.flavor.ws_port(), Scheme::Ws).await?;
        if self.version.is_merged() {
            handle.resolve(EndpointKind::Engine, EXECUTION_ENGINE_PORT, Scheme::Http).await?;
        }
        info!(
            container = handle.container_name(),
            client = %self.flavor.layer(),
            http = %handle.external_url(EndpointKind::Http)?,
            "Execution client started"
        );
        self.handle = Some(handle);
        Ok(())
    }

    async fn wait_until_chain_is_ready(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<(), DevnetError> {
        let handle = self.handle.as_ref().ok_or_else(|| DevnetError::DependencyResolution {
            role: ContainerRole::ExecutionLayer,
            what: "started container".to_string(),
        })?;
        let strategy = self.chain_ready_strategy(timeout)?;
        info!(container = %self.name, timeout = ?strategy.timeout(), "Waiting for chain to start producing blocks");
        let target: &dyn WaitTarget = handle.container().as_ref();
        strategy
            .wait_until_ready(cancel, target)
            .await
            .map_err(|err| DevnetError::from_wait(self.name.clone(), err))
    }

    fn handle(&self) -> Option<&ComponentHandle> {
        self.handle.as_ref()
    }
}
