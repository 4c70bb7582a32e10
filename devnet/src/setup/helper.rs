use std::{path::PathBuf, time::Duration};

use crate::{
    config::random_jwt_secret_hex,
    containers::{
        ContainerRole, GENERATED_DATA_DIR, WALLET_PASSWORD, account_password_file, jwt_secret_file,
        keystore_dir, wallet_password_file,
    },
    images::VAL_TOOLS_IMAGE,
    launcher::FALLBACK_PLATFORM,
    runtime::ContainerSpec,
    unique_name,
    wait::ExitCodeStrategy,
};

/// Keystore of the execution client account, with an empty password.
pub const EXECUTION_KEYSTORE: &str = r#"{"address":"123463a4b065722e99115d6c222f267d9cabb524","crypto":{"cipher":"aes-128-ctr","ciphertext":"93b90389b855889b9f91c89fd15b9bd2ae95b06fe8e2314009fc88859fc6fde9","cipherparams":{"iv":"9dc2eff7967505f0e6a40264d1511742"},"kdf":"scrypt","kdfparams":{"dklen":32,"n":262144,"p":1,"r":8,"salt":"c07503bb1b66083c37527cd8f06f8c7c1443d4c724767f625743bd47ae6179a4"},"mac":"6d359be5d6c432d5bbb859484009a4bf1bd71b76e89420c380bd0593ce25a817"},"id":"622df904-0bb1-4236-b254-f1b8dfdff1ec","version":3}"#;

const SCRIPT_PATH: &str = "/init.sh";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Execution account keystore file inside the generated data directory.
pub fn account_keystore_file() -> String {
    format!("{}/key.json", keystore_dir())
}

/// Renders the helper script for a chain starting at `genesis_timestamp`.
pub fn init_script(jwt_secret: &str, genesis_timestamp: u64) -> String {
    let wallet_password_file = wallet_password_file();
    let keystore_dir = keystore_dir();
    let keystore_file = account_keystore_file();
    let account_password_file = account_password_file();
    let jwt_file = jwt_secret_file();
    format!(
        r#"#!/bin/sh
set -e
echo "Saving wallet password to {wallet_password_file}"
echo "{WALLET_PASSWORD}" > {wallet_password_file}
echo "Saving execution client keystore file to {keystore_file}"
mkdir -p {keystore_dir}
echo '{EXECUTION_KEYSTORE}' > {keystore_file}
echo "Saving execution client account password to {account_password_file}"
echo "" > {account_password_file}
echo "Saving jwt secret to {jwt_file}"
echo "{jwt_secret}" > {jwt_file}
echo "Chain genesis timestamp: {genesis_timestamp}"
echo "More or less $(({genesis_timestamp} - $(date +%s))) seconds from now"
"#
    )
}

/// Writes secrets next to the generated genesis: wallet password, execution
/// account keystore and password, and the engine API JWT secret.
#[derive(Debug, Clone)]
pub struct AfterGenesisHelper {
    name: String,
    image: String,
    jwt_secret: String,
    genesis_timestamp: u64,
    host_dir: PathBuf,
    networks: Vec<String>,
    timeout: Duration,
}

impl AfterGenesisHelper {
    /// Creates a helper writing into `host_dir` with a fresh JWT secret.
    pub fn new(genesis_timestamp: u64, host_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: unique_name("after-genesis-helper"),
            image: VAL_TOOLS_IMAGE.to_string(),
            jwt_secret: random_jwt_secret_hex(),
            genesis_timestamp,
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

    /// JWT secret the helper writes.
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Builds the container spec.
    pub fn container_spec(&self) -> ContainerSpec {
        ContainerSpec::new(&self.name, &self.image, ContainerRole::AfterGenesisHelper)
            .with_platform(FALLBACK_PLATFORM)
            .with_entrypoint("sh")
            .with_cmd([SCRIPT_PATH])
            .with_file(SCRIPT_PATH, init_script(&self.jwt_secret, self.genesis_timestamp))
            .with_mount(&self.host_dir, GENERATED_DATA_DIR)
            .with_networks(self.networks.clone())
            .with_wait(
                ExitCodeStrategy::new()
                    .with_timeout(self.timeout)
                    .with_poll_interval(Duration::from_secs(1)),
            )
    }
}
