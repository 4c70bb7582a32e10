use std::{path::PathBuf, time::Duration};

use crate::{
    containers::{ContainerRole, NODE_0_DIR, VALIDATOR_KEYS_DIR, WALLET_PASSWORD},
    images::VAL_TOOLS_IMAGE,
    launcher::FALLBACK_PLATFORM,
    runtime::ContainerSpec,
    setup::genesis::GENESIS_MNEMONIC,
    unique_name,
    wait::ExitCodeStrategy,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Generates validator keystores for a single node from the genesis mnemonic.
#[derive(Debug, Clone)]
pub struct ValKeysGenerator {
    name: String,
    image: String,
    validator_count: u64,
    host_dir: PathBuf,
    networks: Vec<String>,
    timeout: Duration,
}

impl ValKeysGenerator {
    /// Creates a generator writing `validator_count` keys into `host_dir`.
    pub fn new(validator_count: u64, host_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: unique_name("val-keys-generator"),
            image: VAL_TOOLS_IMAGE.to_string(),
            validator_count,
            host_dir: host_dir.into(),
            networks: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
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

    /// Sets how long key generation may take.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line of `eth2-val-tools`.
    pub fn command(&self) -> Vec<String> {
        [
            "keystores",
            "--insecure",
            "--prysm-pass",
            WALLET_PASSWORD,
            "--out-loc",
            NODE_0_DIR,
            "--source-max",
            &self.validator_count.to_string(),
            "--source-min",
            "0",
            "--source-mnemonic",
            GENESIS_MNEMONIC,
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    /// Builds the container spec.
    pub fn container_spec(&self) -> ContainerSpec {
        ContainerSpec::new(&self.name, &self.image, ContainerRole::ValKeysGenerator)
            .with_platform(FALLBACK_PLATFORM)
            .with_cmd(self.command())
            .with_mount(&self.host_dir, VALIDATOR_KEYS_DIR)
            .with_networks(self.networks.clone())
            .with_wait(
                ExitCodeStrategy::new()
                    .with_timeout(self.timeout)
                    .with_poll_interval(Duration::from_secs(1)),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_covers_all_validators() {
        let generator = ValKeysGenerator::new(8, "/tmp/keys");
        let cmd = generator.command().join(" ");
        assert!(cmd.starts_with("keystores --insecure --prysm-pass password --out-loc /keys/node-0"));
        assert!(cmd.contains("--source-max 8 --source-min 0"));
    }

    #[test]
    fn test_spec_mounts_keys_dir() {
        let spec = ValKeysGenerator::new(4, "/tmp/keys").with_image(Some("tools:1".into())).container_spec();
        assert_eq!(spec.image(), "tools:1");
        assert_eq!(spec.mounts()[0].container, VALIDATOR_KEYS_DIR);
        assert_eq!(spec.role(), ContainerRole::ValKeysGenerator);
        assert!(spec.name().starts_with("val-keys-generator-"));
    }
}
