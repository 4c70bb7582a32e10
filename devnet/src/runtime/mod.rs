//! The container runtime seam.
//!
//! Everything above this module talks to containers through
//! [`ContainerRuntime`], [`RunningContainer`] and [`WaitTarget`]. The Docker
//! implementation lives in [`docker`]; tests use the in-memory runtime from
//! `test_utils`.

use std::{collections::BTreeMap, fmt, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{containers::ContainerRole, error::RuntimeError, wait::WaitStrategy};

pub mod docker;
pub use docker::DockerRuntime;

/// Observed process state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerState {
    /// Whether the main process is still running.
    pub running: bool,
    /// Exit code once the process has exited.
    pub exit_code: Option<i64>,
}

impl ContainerState {
    /// State of a running container.
    pub const RUNNING: Self = Self { running: true, exit_code: None };

    /// State of a container whose process exited with `code`.
    pub const fn exited(code: i64) -> Self {
        Self { running: false, exit_code: Some(code) }
    }
}

/// Result of a command executed inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code, if the runtime reported one.
    pub exit_code: Option<i64>,
    /// Captured standard output.
    pub stdout: Vec<u8>,
}

/// Read-only view of a started container, as needed by readiness checks.
///
/// Implementations must not change the container when queried.
#[async_trait]
pub trait WaitTarget: Send + Sync + fmt::Debug {
    /// Container name.
    fn name(&self) -> &str;

    /// Returns whether the process is still running and its exit code.
    async fn state(&self) -> Result<ContainerState, RuntimeError>;

    /// Returns the full log output so far.
    async fn logs(&self) -> Result<Vec<u8>, RuntimeError>;

    /// Returns the host address under which mapped ports are reachable.
    async fn host(&self) -> Result<String, RuntimeError>;

    /// Resolves a container port to the host port it is mapped to.
    async fn host_port(&self, port: u16) -> Result<u16, RuntimeError>;

    /// Runs a one-off command inside the container.
    async fn exec(&self, cmd: Vec<String>) -> Result<ExecOutput, RuntimeError>;
}

/// A container the runtime created and started.
#[async_trait]
pub trait RunningContainer: WaitTarget {
    /// Runtime-assigned container id.
    fn id(&self) -> &str;

    /// Stops and removes the container.
    async fn terminate(&self) -> Result<(), RuntimeError>;
}

/// Narrow interface to a container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + fmt::Debug {
    /// Creates an isolated network. Succeeds if it already exists.
    async fn create_network(&self, name: &str) -> Result<(), RuntimeError>;

    /// Removes a network. Succeeds if it does not exist.
    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError>;

    /// Creates and starts a container. Does not run the spec's wait strategy.
    async fn start(&self, spec: &ContainerSpec) -> Result<Arc<dyn RunningContainer>, RuntimeError>;

    /// Force-removes the container with this name. Succeeds if it does not exist.
    async fn remove(&self, name: &str) -> Result<(), RuntimeError>;
}

/// Host directory bind-mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Path on the host.
    pub host: PathBuf,
    /// Path inside the container.
    pub container: String,
}

/// File copied into a container before it starts.
#[derive(Clone, PartialEq, Eq)]
pub struct ContainerFile {
    /// Path inside the container.
    pub path: String,
    /// File contents.
    pub contents: Vec<u8>,
}

impl fmt::Debug for ContainerFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerFile")
            .field("path", &self.path)
            .field("len", &self.contents.len())
            .finish()
    }
}

/// Everything needed to create one container.
///
/// Specs are assembled with the `with_*` methods and never changed in place
/// afterwards; retry policies derive adjusted copies.
#[derive(Clone)]
pub struct ContainerSpec {
    name: String,
    image: String,
    role: ContainerRole,
    platform: Option<String>,
    ports: Vec<u16>,
    env: BTreeMap<String, String>,
    mounts: Vec<BindMount>,
    files: Vec<ContainerFile>,
    entrypoint: Option<String>,
    cmd: Vec<String>,
    networks: Vec<String>,
    wait: Option<Arc<dyn WaitStrategy>>,
    reuse: bool,
    startup_timeout: Option<Duration>,
}

impl fmt::Debug for ContainerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerSpec")
            .field("name", &self.name)
            .field("image", &self.image)
            .field("role", &self.role)
            .field("platform", &self.platform)
            .field("ports", &self.ports)
            .field("networks", &self.networks)
            .field("reuse", &self.reuse)
            .finish_non_exhaustive()
    }
}

impl ContainerSpec {
    /// Creates a spec for `image` (in `name:tag` form) named `name`.
    pub fn new(name: impl Into<String>, image: impl Into<String>, role: ContainerRole) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            role,
            platform: None,
            ports: Vec::new(),
            env: BTreeMap::new(),
            mounts: Vec::new(),
            files: Vec::new(),
            entrypoint: None,
            cmd: Vec::new(),
            networks: Vec::new(),
            wait: None,
            reuse: false,
            startup_timeout: None,
        }
    }

    /// Sets the target platform, e.g. `linux/x86_64`.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Exposes a TCP port.
    pub fn with_exposed_port(mut self, port: u16) -> Self {
        self.ports.push(port);
        self
    }

    /// Sets an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Bind-mounts a host path.
    pub fn with_mount(mut self, host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        self.mounts.push(BindMount { host: host.into(), container: container.into() });
        self
    }

    /// Copies a file into the container before start.
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push(ContainerFile { path: path.into(), contents: contents.into() });
        self
    }

    /// Overrides the image entrypoint.
    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    /// Sets the command.
    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches the container to these networks.
    pub fn with_networks(mut self, networks: impl IntoIterator<Item = String>) -> Self {
        self.networks = networks.into_iter().collect();
        self
    }

    /// Attaches the readiness check run after start.
    pub fn with_wait(mut self, wait: impl WaitStrategy + 'static) -> Self {
        self.wait = Some(Arc::new(wait));
        self
    }

    /// Sets whether an existing container with the same name may be reused.
    pub const fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }

    /// Bounds how long the runtime may take to start the container.
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    /// Drops files that would only be needed by a first start.
    pub fn without_files(mut self) -> Self {
        self.files.clear();
        self
    }

    /// Container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image in `name:tag` form.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Role of the container.
    pub const fn role(&self) -> ContainerRole {
        self.role
    }

    /// Target platform, if forced.
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Exposed ports.
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Environment variables.
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Bind mounts.
    pub fn mounts(&self) -> &[BindMount] {
        &self.mounts
    }

    /// Files copied in before start.
    pub fn files(&self) -> &[ContainerFile] {
        &self.files
    }

    /// Entrypoint override.
    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    /// Command.
    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    /// Networks to attach to.
    pub fn networks(&self) -> &[String] {
        &self.networks
    }

    /// Readiness check.
    pub fn wait(&self) -> Option<&Arc<dyn WaitStrategy>> {
        self.wait.as_ref()
    }

    /// Whether an existing container may be reused.
    pub const fn reuse(&self) -> bool {
        self.reuse
    }

    /// Startup timeout.
    pub const fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout
    }
}
