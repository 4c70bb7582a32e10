//! Persisted description of a running network.
//!
//! A topology written by one test process can be loaded by another to
//! reattach to the same containers without rerunning any setup container.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::{CONFIG_ENV_VAR, ChainConfig, ConsensusLayer, EthereumVersion, ExecutionLayer, NodeLogLevel},
    containers::ContainerRole,
    error::{DevnetError, PersistenceError, ValidationError},
    setup::HostDirs,
    utils::random_suffix,
};

/// Directory topologies are saved in, relative to the working directory.
pub const TOPOLOGY_DIR: &str = ".private_chains";

/// A started container and the role it plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container name, stable across processes.
    pub container_name: String,
    /// Role of the container.
    pub container_type: ContainerRole,
}

/// Which components run, where their state lives and how the chain is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTopology {
    /// Pre-merge or merged chain.
    pub ethereum_version: Option<EthereumVersion>,
    /// Execution client kind.
    pub execution_layer: Option<ExecutionLayer>,
    /// Consensus client kind, absent for pre-merge chains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_layer: Option<ConsensusLayer>,
    /// Docker networks the containers are attached to.
    #[serde(default)]
    pub docker_network_names: Vec<String>,
    /// Started long-lived containers. Setup containers are never recorded.
    #[serde(default)]
    pub containers: Vec<ContainerRecord>,
    /// Whether startup waited for the first finalized epoch.
    #[serde(default)]
    pub wait_for_finalization: bool,
    /// Host directory with genesis files and secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_data_host_dir: Option<PathBuf>,
    /// Host directory with validator keystores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_keys_dir: Option<PathBuf>,
    /// Chain parameters.
    #[serde(default)]
    pub chain_config: ChainConfig,
    /// Image overrides by role.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_docker_images: BTreeMap<ContainerRole, String>,
    /// Execution client log level.
    #[serde(default)]
    pub node_log_level: NodeLogLevel,
    /// Whether this topology was loaded to reattach to running containers.
    #[serde(skip)]
    pub was_reattached: bool,
}

impl NetworkTopology {
    /// Name of the container playing `role`, if one was started.
    pub fn container(&self, role: ContainerRole) -> Option<&str> {
        self.containers
            .iter()
            .find(|record| record.container_type == role)
            .map(|record| record.container_name.as_str())
    }

    /// Records the container playing `role`, replacing an earlier one.
    pub fn record(&mut self, role: ContainerRole, name: impl Into<String>) {
        let name = name.into();
        match self.containers.iter_mut().find(|record| record.container_type == role) {
            Some(record) => record.container_name = name,
            None => self.containers.push(ContainerRecord { container_name: name, container_type: role }),
        }
    }

    /// Role to container name mapping.
    pub fn role_map(&self) -> BTreeMap<ContainerRole, String> {
        self.containers.iter().map(|record| (record.container_type, record.container_name.clone())).collect()
    }

    /// Recorded host directories, if both are known.
    pub fn host_dirs(&self) -> Option<HostDirs> {
        Some(HostDirs {
            generated_data: self.generated_data_host_dir.clone()?,
            val_keys: self.val_keys_dir.clone()?,
        })
    }

    /// Records the host directories.
    pub fn set_host_dirs(&mut self, dirs: &HostDirs) {
        self.generated_data_host_dir = Some(dirs.generated_data.clone());
        self.val_keys_dir = Some(dirs.val_keys.clone());
    }

    /// Saves the topology under [`TOPOLOGY_DIR`] with a random file name.
    pub fn save(&self) -> Result<PathBuf, PersistenceError> {
        self.save_in(TOPOLOGY_DIR)
    }

    /// Saves the topology under `dir` with a random file name.
    pub fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf, PersistenceError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| PersistenceError::Io { path: dir.to_path_buf(), source })?;
        let path = dir.join(format!("ethereum_network_{}.json", random_suffix()));
        let content = serde_json::to_string_pretty(self).map_err(PersistenceError::Serialize)?;
        fs::write(&path, content).map_err(|source| PersistenceError::Io { path: path.clone(), source })?;

        let absolute = path.canonicalize().unwrap_or_else(|_| path.clone());
        info!(path = %absolute.display(), "Saved network topology");
        info!("To reuse in e2e tests, set: {CONFIG_ENV_VAR}={}", absolute.display());
        Ok(path)
    }

    /// Loads a saved topology.
    ///
    /// Fails if a field needed to reattach is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|source| PersistenceError::Io { path: path.to_path_buf(), source })?;
        let topology: Self = serde_json::from_str(&content)
            .map_err(|source| PersistenceError::Parse { path: path.to_path_buf(), source })?;
        topology.check_complete(path)?;
        Ok(topology)
    }

    /// Loads the topology named by the `PRIVATE_ETHEREUM_NETWORK_CONFIG_PATH` variable.
    pub fn from_env() -> Result<Self, DevnetError> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .filter(|path| !path.is_empty())
            .ok_or(ValidationError::MissingTopologyEnvVar(CONFIG_ENV_VAR))?;
        info!(path = ?path, "Loading network topology from environment");
        Ok(Self::load(PathBuf::from(path))?)
    }

    fn check_complete(&self, path: &Path) -> Result<(), PersistenceError> {
        let missing = |field| PersistenceError::MissingField { path: path.to_path_buf(), field };
        let version = self.ethereum_version.ok_or_else(|| missing("ethereum_version"))?;
        self.execution_layer.ok_or_else(|| missing("execution_layer"))?;
        if self.container(ContainerRole::ExecutionLayer).is_none() {
            return Err(missing("containers"));
        }
        if version.is_merged() {
            self.consensus_layer.ok_or_else(|| missing("consensus_layer"))?;
            self.generated_data_host_dir.as_ref().ok_or_else(|| missing("generated_data_host_dir"))?;
            self.val_keys_dir.as_ref().ok_or_else(|| missing("val_keys_dir"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged() -> NetworkTopology {
        let mut topology = NetworkTopology {
            ethereum_version: Some(EthereumVersion::Eth2),
            execution_layer: Some(ExecutionLayer::Geth),
            consensus_layer: Some(ConsensusLayer::Prysm),
            docker_network_names: vec!["network-abc".into()],
            chain_config: ChainConfig::default(),
            ..Default::default()
        };
        topology.set_host_dirs(&HostDirs { generated_data: "/tmp/metadata1".into(), val_keys: "/tmp/val_keys1".into() });
        topology.record(ContainerRole::ExecutionLayer, "geth-1");
        topology.record(ContainerRole::ConsensusLayer, "prysm-beacon-chain-1");
        topology.record(ContainerRole::ConsensusValidator, "prysm-validator-1");
        topology
    }

    #[test]
    fn test_save_then_load_keeps_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let topology = merged();

        let path = topology.save_in(dir.path()).unwrap();
        let loaded = NetworkTopology::load(&path).unwrap();

        assert_eq!(loaded, topology);
        assert!(!loaded.was_reattached);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("ethereum_network_") && name.ends_with(".json"));
    }

    #[test]
    fn test_saves_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let first = merged().save_in(dir.path()).unwrap();
        let second = merged().save_in(dir.path()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_file_uses_snake_case_roles() {
        let json = serde_json::to_value(merged()).unwrap();
        assert_eq!(json["containers"][0]["container_type"], "execution_layer");
        assert_eq!(json["ethereum_version"], "eth2");
        assert!(json.get("was_reattached").is_none());
    }

    #[test]
    fn test_record_keeps_one_container_per_role() {
        let mut topology = merged();
        topology.record(ContainerRole::ExecutionLayer, "geth-2");
        assert_eq!(topology.container(ContainerRole::ExecutionLayer), Some("geth-2"));
        assert_eq!(topology.containers.len(), 3);
    }

    #[test]
    fn test_missing_execution_layer_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        let mut json = serde_json::to_value(merged()).unwrap();
        json.as_object_mut().unwrap().remove("execution_layer");
        fs::write(&path, json.to_string()).unwrap();

        let err = NetworkTopology::load(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::MissingField { field: "execution_layer", .. }));
    }

    #[test]
    fn test_merged_topology_needs_host_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut topology = merged();
        topology.val_keys_dir = None;
        let path = topology.save_in(dir.path()).unwrap();
        let err = NetworkTopology::load(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::MissingField { field: "val_keys_dir", .. }));
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(NetworkTopology::load(&path), Err(PersistenceError::Parse { .. })));
    }
}
