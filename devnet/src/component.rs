//! Handles to running network components.

use std::{collections::BTreeMap, fmt, sync::Arc};

use tracing::info;

use crate::{
    containers::ContainerRole,
    error::{DevnetError, RuntimeError},
    runtime::RunningContainer,
};

/// Formats an HTTP URL.
pub fn format_http_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

/// Formats a WebSocket URL.
pub fn format_ws_url(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}")
}

/// Kind of endpoint a component exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKind {
    /// JSON-RPC over HTTP.
    Http,
    /// JSON-RPC over WebSocket.
    Ws,
    /// Authenticated engine API.
    Engine,
    /// Beacon node endpoint consumed by validators.
    BeaconRpc,
    /// Beacon node HTTP API.
    BeaconHttp,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Ws => "ws",
            Self::Engine => "engine",
            Self::BeaconRpc => "beacon rpc",
            Self::BeaconHttp => "beacon http",
        })
    }
}

/// URL scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `http://host:port`.
    Http,
    /// `ws://host:port`.
    Ws,
    /// Bare `host:port`, as used by gRPC clients.
    Bare,
}

impl Scheme {
    fn format(self, host: &str, port: u16) -> String {
        match self {
            Self::Http => format_http_url(host, port),
            Self::Ws => format_ws_url(host, port),
            Self::Bare => format!("{host}:{port}"),
        }
    }
}

/// An endpoint as seen from inside the network and from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Address other containers on the network use.
    pub internal: String,
    /// Address reachable from the host.
    pub external: String,
}

/// A started component: its role, container and resolved endpoints.
#[derive(Debug, Clone)]
pub struct ComponentHandle {
    role: ContainerRole,
    container: Arc<dyn RunningContainer>,
    endpoints: BTreeMap<EndpointKind, Endpoint>,
    recreated: bool,
}

impl ComponentHandle {
    /// Wraps a started container.
    pub fn new(role: ContainerRole, container: Arc<dyn RunningContainer>, recreated: bool) -> Self {
        Self { role, container, endpoints: BTreeMap::new(), recreated }
    }

    /// Resolves `port` into an internal and an external address.
    pub async fn resolve(
        &mut self,
        kind: EndpointKind,
        port: u16,
        scheme: Scheme,
    ) -> Result<&Endpoint, DevnetError> {
        let role = self.role;
        let unresolved = move |err: RuntimeError| DevnetError::DependencyResolution {
            role,
            what: format!("{kind} endpoint on port {port}: {err}"),
        };
        let host = self.container.host().await.map_err(unresolved)?;
        let host_port = self.container.host_port(port).await.map_err(unresolved)?;
        let endpoint = Endpoint {
            internal: scheme.format(self.container.name(), port),
            external: scheme.format(&host, host_port),
        };
        Ok(self.endpoints.entry(kind).or_insert(endpoint))
    }

    /// Returns a resolved endpoint.
    pub fn endpoint(&self, kind: EndpointKind) -> Result<&Endpoint, DevnetError> {
        self.endpoints.get(&kind).ok_or_else(|| DevnetError::DependencyResolution {
            role: self.role,
            what: format!("{kind} endpoint"),
        })
    }

    /// Address of `kind` for other containers.
    pub fn internal_url(&self, kind: EndpointKind) -> Result<String, DevnetError> {
        self.endpoint(kind).map(|endpoint| endpoint.internal.clone())
    }

    /// Address of `kind` for the host.
    pub fn external_url(&self, kind: EndpointKind) -> Result<String, DevnetError> {
        self.endpoint(kind).map(|endpoint| endpoint.external.clone())
    }

    /// Role of the component.
    pub const fn role(&self) -> ContainerRole {
        self.role
    }

    /// Container name, which identifies the container across processes.
    pub fn container_name(&self) -> &str {
        self.container.name()
    }

    /// Runtime-assigned container id.
    pub fn container_id(&self) -> &str {
        self.container.id()
    }

    /// The underlying container.
    pub const fn container(&self) -> &Arc<dyn RunningContainer> {
        &self.container
    }

    /// Whether this handle reattached to a container from an earlier run.
    pub const fn was_recreated(&self) -> bool {
        self.recreated
    }

    /// Stops and removes the container.
    pub async fn terminate(&self) -> Result<(), RuntimeError> {
        info!(container = self.container_name(), role = %self.role, "Terminating container");
        self.container.terminate().await
    }
}
