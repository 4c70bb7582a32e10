//! One-shot setup containers that prepare a fresh merged chain.
//!
//! They run in a fixed order, each gated by its exit code: validator keys,
//! then genesis, then the helper that writes secrets next to the genesis
//! files. A failing stage stops the sequence before the next one starts.

use std::{collections::BTreeMap, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::ChainConfig,
    containers::{ContainerRole, GENERATED_DATA_DIR},
    error::DevnetError,
    launcher::Launcher,
    runtime::ContainerSpec,
};

mod genesis;
pub use genesis::{GenesisGenerator, values_env};

mod helper;
pub use helper::{AfterGenesisHelper, EXECUTION_KEYSTORE, account_keystore_file, init_script};

mod val_keys;
pub use val_keys::ValKeysGenerator;

/// Host directories shared with the setup and node containers.
///
/// They are not removed when the network stops, so a later process can
/// reattach to containers that still mount them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDirs {
    /// Genesis files, JWT secret and wallet password.
    pub generated_data: PathBuf,
    /// Validator keystores.
    pub val_keys: PathBuf,
}

impl HostDirs {
    /// Creates both directories under the system temp directory.
    pub fn create() -> io::Result<Self> {
        let generated_data = tempfile::Builder::new().prefix("metadata").tempdir()?.keep();
        let val_keys = tempfile::Builder::new().prefix("val_keys").tempdir()?.keep();
        Ok(Self { generated_data, val_keys })
    }

    /// Files written by the genesis generator and the helper.
    pub fn generated(&self) -> GeneratedData {
        GeneratedData { dir: self.generated_data.clone() }
    }
}

/// Host view of the generated data directory.
#[derive(Debug, Clone)]
pub struct GeneratedData {
    dir: PathBuf,
}

impl GeneratedData {
    /// The directory as mounted inside node containers.
    pub fn in_container() -> Self {
        Self { dir: PathBuf::from(GENERATED_DATA_DIR) }
    }

    /// Returns the directory.
    pub const fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Returns the path to the execution genesis used by geth, erigon and reth.
    pub fn genesis_path(&self) -> PathBuf {
        self.dir.join("genesis.json")
    }

    /// Returns the path to the besu genesis.
    pub fn besu_genesis_path(&self) -> PathBuf {
        self.dir.join("besu.json")
    }

    /// Returns the path to the nethermind chainspec.
    pub fn chainspec_path(&self) -> PathBuf {
        self.dir.join("chainspec.json")
    }

    /// Returns the path to the consensus genesis state.
    pub fn genesis_ssz_path(&self) -> PathBuf {
        self.dir.join("genesis.ssz")
    }

    /// Returns the path to the consensus config.
    pub fn cl_config_path(&self) -> PathBuf {
        self.dir.join("config.yaml")
    }

    /// Returns the path to the JWT secret.
    pub fn jwt_path(&self) -> PathBuf {
        self.dir.join("jwtsecret")
    }

    /// Reads the JWT secret.
    pub fn read_jwt_secret(&self) -> io::Result<String> {
        std::fs::read_to_string(self.jwt_path()).map(|secret| secret.trim().to_string())
    }
}

/// The three setup containers of a fresh merged network.
#[derive(Debug, Clone)]
pub struct SetupSequence {
    val_keys: ValKeysGenerator,
    genesis: GenesisGenerator,
    helper: AfterGenesisHelper,
}

impl SetupSequence {
    /// Prepares the setup containers for `chain`, writing into `dirs`.
    ///
    /// `images` overrides default images by role.
    pub fn new(
        chain: &ChainConfig,
        dirs: &HostDirs,
        networks: &[String],
        images: &BTreeMap<ContainerRole, String>,
    ) -> Self {
        let image = |role| images.get(&role).cloned();
        Self {
            val_keys: ValKeysGenerator::new(chain.validator_count, &dirs.val_keys)
                .with_image(image(ContainerRole::ValKeysGenerator))
                .with_networks(networks.to_vec()),
            genesis: GenesisGenerator::new(chain.clone(), &dirs.generated_data)
                .with_image(image(ContainerRole::GenesisGenerator))
                .with_networks(networks.to_vec()),
            helper: AfterGenesisHelper::new(chain.genesis_timestamp, &dirs.generated_data)
                .with_image(image(ContainerRole::AfterGenesisHelper))
                .with_networks(networks.to_vec()),
        }
    }

    /// Container specs in the order they run.
    pub fn specs(&self) -> [ContainerSpec; 3] {
        [self.val_keys.container_spec(), self.genesis.container_spec(), self.helper.container_spec()]
    }

    /// Runs every stage to completion and removes the exited containers.
    pub async fn run(&self, launcher: &Launcher, cancel: &CancellationToken) -> Result<(), DevnetError> {
        for spec in self.specs() {
            let container = launcher.launch(cancel, &spec).await?;
            info!(container = spec.name(), role = %spec.role(), "Setup container finished");
            if let Err(err) = container.terminate().await {
                warn!(container = spec.name(), error = %err, "Failed to remove setup container");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        error::RuntimeError,
        runtime::ContainerState,
        test_utils::{MockContainer, MockRuntime},
    };

    fn sequence() -> SetupSequence {
        let mut chain = ChainConfig::default();
        chain.generate_genesis_timestamp();
        let dirs = HostDirs { generated_data: "/tmp/metadata".into(), val_keys: "/tmp/val_keys".into() };
        SetupSequence::new(&chain, &dirs, &["net".to_string()], &BTreeMap::new())
    }

    #[test]
    fn test_generated_data_paths() {
        let data = HostDirs { generated_data: "/tmp/m".into(), val_keys: "/tmp/v".into() }.generated();
        assert_eq!(data.jwt_path(), PathBuf::from("/tmp/m/jwtsecret"));
        assert_eq!(data.genesis_path(), PathBuf::from("/tmp/m/genesis.json"));
    }

    #[test]
    fn test_host_dirs_are_created_and_kept() {
        let dirs = HostDirs::create().unwrap();
        assert!(dirs.generated_data.is_dir());
        assert!(dirs.val_keys.is_dir());
        assert_ne!(dirs.generated_data, dirs.val_keys);
        std::fs::remove_dir_all(&dirs.generated_data).unwrap();
        std::fs::remove_dir_all(&dirs.val_keys).unwrap();
    }

    #[tokio::test]
    async fn test_stages_run_in_order_and_are_removed() {
        let runtime = Arc::new(MockRuntime::new());
        let launcher = Launcher::new(runtime.clone());
        let sequence = sequence();

        sequence.run(&launcher, &CancellationToken::new()).await.unwrap();

        let roles: Vec<_> = runtime.starts().iter().map(|start| start.role).collect();
        assert_eq!(
            roles,
            vec![ContainerRole::ValKeysGenerator, ContainerRole::GenesisGenerator, ContainerRole::AfterGenesisHelper]
        );
        for spec in sequence.specs() {
            assert!(runtime.container(spec.name()).unwrap().is_terminated());
        }
    }

    #[tokio::test]
    async fn test_failed_key_generation_stops_the_sequence() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.always_fail_starts(ContainerRole::ValKeysGenerator, RuntimeError::new("image pull failed"));
        let launcher = Launcher::new(runtime.clone()).with_max_attempts(1);

        let err = sequence().run(&launcher, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, DevnetError::Launch { .. }));
        assert!(runtime.starts_of(ContainerRole::GenesisGenerator).is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_blocks_genesis() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.set_container(
            ContainerRole::ValKeysGenerator,
            MockContainer::template(ContainerRole::ValKeysGenerator).with_state(ContainerState::exited(1)),
        );
        let launcher = Launcher::new(runtime.clone());
        let mut sequence = sequence();
        sequence.val_keys = sequence.val_keys.with_timeout(std::time::Duration::from_millis(50));

        let err = sequence.run(&launcher, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, DevnetError::ReadinessTimeout { .. }));
        assert!(runtime.starts_of(ContainerRole::GenesisGenerator).is_empty());
    }
}
