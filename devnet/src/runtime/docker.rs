//! Docker runtime backed by testcontainers.

use std::sync::Arc;

use async_trait::async_trait;
use testcontainers::{
    ContainerAsync, ContainerRequest, GenericImage, ImageExt,
    core::{IntoContainerPort, Mount, ReuseDirective},
    runners::AsyncRunner,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, RunningContainer, WaitTarget};
use crate::{error::RuntimeError, network};

/// Runs containers on the local Docker daemon.
///
/// Only the first network of a spec is attached; topologies here use one
/// network per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerRuntime;

impl DockerRuntime {
    /// Creates a Docker runtime.
    pub const fn new() -> Self {
        Self
    }

    fn request(spec: &ContainerSpec) -> Result<ContainerRequest<GenericImage>, RuntimeError> {
        let (image_name, image_tag) = spec
            .image()
            .rsplit_once(':')
            .ok_or_else(|| RuntimeError::new(format!("image {} has no tag", spec.image())))?;

        let mut image = GenericImage::new(image_name, image_tag);
        if let Some(entrypoint) = spec.entrypoint() {
            image = image.with_entrypoint(entrypoint);
        }
        for port in spec.ports() {
            image = image.with_exposed_port(port.tcp());
        }

        let mut request = image.with_container_name(spec.name());
        if let Some(network) = spec.networks().first() {
            request = request.with_network(network);
        }
        for (key, value) in spec.env() {
            request = request.with_env_var(key, value);
        }
        for mount in spec.mounts() {
            request = request.with_mount(Mount::bind_mount(
                mount.host.to_string_lossy().to_string(),
                &mount.container,
            ));
        }
        for file in spec.files() {
            request = request.with_copy_to(&file.path, file.contents.clone());
        }
        if !spec.cmd().is_empty() {
            request = request.with_cmd(spec.cmd().to_vec());
        }
        if let Some(platform) = spec.platform() {
            request = request.with_platform(platform);
        }
        if spec.reuse() {
            request = request.with_reuse(ReuseDirective::Always);
        }
        if let Some(timeout) = spec.startup_timeout() {
            request = request.with_startup_timeout(timeout);
        }
        Ok(request)
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_network(&self, name: &str) -> Result<(), RuntimeError> {
        network::ensure_network_exists(name).await
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        network::remove_network(name).await
    }

    async fn start(&self, spec: &ContainerSpec) -> Result<Arc<dyn RunningContainer>, RuntimeError> {
        if spec.networks().len() > 1 {
            warn!(container = spec.name(), networks = ?spec.networks(), "Only the first network is attached");
        }
        let container = Self::request(spec)?.start().await?;
        debug!(container = spec.name(), id = container.id(), image = spec.image(), "Container started");
        Ok(Arc::new(DockerContainer {
            id: container.id().to_string(),
            name: spec.name().to_string(),
            container: Mutex::new(Some(container)),
        }))
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        network::remove_container(name).await
    }
}

/// A container started by [`DockerRuntime`].
#[derive(Debug)]
pub struct DockerContainer {
    id: String,
    name: String,
    container: Mutex<Option<ContainerAsync<GenericImage>>>,
}

impl DockerContainer {
    fn terminated(&self) -> RuntimeError {
        RuntimeError::new(format!("container {} was terminated", self.name))
    }
}

#[async_trait]
impl WaitTarget for DockerContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn state(&self) -> Result<ContainerState, RuntimeError> {
        let guard = self.container.lock().await;
        let container = guard.as_ref().ok_or_else(|| self.terminated())?;
        let running = container.is_running().await?;
        let exit_code = if running { None } else { container.exit_code().await? };
        Ok(ContainerState { running, exit_code })
    }

    async fn logs(&self) -> Result<Vec<u8>, RuntimeError> {
        let guard = self.container.lock().await;
        let container = guard.as_ref().ok_or_else(|| self.terminated())?;
        let mut logs = container.stdout_to_vec().await?;
        logs.extend(container.stderr_to_vec().await?);
        Ok(logs)
    }

    async fn host(&self) -> Result<String, RuntimeError> {
        let guard = self.container.lock().await;
        let container = guard.as_ref().ok_or_else(|| self.terminated())?;
        Ok(container.get_host().await?.to_string())
    }

    async fn host_port(&self, port: u16) -> Result<u16, RuntimeError> {
        let guard = self.container.lock().await;
        let container = guard.as_ref().ok_or_else(|| self.terminated())?;
        Ok(container.get_host_port_ipv4(port.tcp()).await?)
    }

    async fn exec(&self, cmd: Vec<String>) -> Result<ExecOutput, RuntimeError> {
        if self.container.lock().await.is_none() {
            return Err(self.terminated());
        }
        let (exit_code, stdout) = network::exec_in_container(&self.id, &cmd).await?;
        Ok(ExecOutput { exit_code, stdout })
    }
}

#[async_trait]
impl RunningContainer for DockerContainer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn terminate(&self) -> Result<(), RuntimeError> {
        let container = self.container.lock().await.take();
        match container {
            Some(container) => Ok(container.rm().await?),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_container_futures_are_send() {
        let container = DockerContainer { id: "abc".into(), name: "geth-abc".into(), container: Mutex::new(None) };
        assert_send(&container.exec(vec!["true".to_string()]));
        assert_send(&container.logs());
        assert_send(&container.terminate());
    }

    #[tokio::test]
    async fn test_terminated_container_rejects_exec() {
        let container = DockerContainer { id: "abc".into(), name: "geth-abc".into(), container: Mutex::new(None) };
        let err = container.exec(vec!["true".to_string()]).await.unwrap_err();
        assert!(err.contains("was terminated"));
    }
}
