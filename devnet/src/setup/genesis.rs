use std::{fmt::Write as _, path::PathBuf, time::Duration};

use crate::{
    config::ChainConfig,
    containers::{ContainerRole, GENERATED_DATA_DIR},
    images::GENESIS_GENERATOR_IMAGE,
    launcher::FALLBACK_PLATFORM,
    runtime::ContainerSpec,
    unique_name,
    wait::ExitCodeStrategy,
};

/// Mnemonic the genesis validators and the validator keystores derive from.
pub(crate) const GENESIS_MNEMONIC: &str = "giant issue aisle success illegal bike spike question tent bar rely arctic volcano long crawl hungry vocal artwork sniff fantasy very lucky have athlete";

const DEPOSIT_CONTRACT_ADDRESS: &str = "0x4242424242424242424242424242424242424242";
const WITHDRAWAL_ADDRESS: &str = "0xf97e180c050e5Ab072211Ad2C213Eb5AEE4DF134";
/// Far enough out that no short-lived network reaches it.
const DENEB_FORK_EPOCH: u64 = 500;
const FAR_FUTURE_EPOCH: u64 = u64::MAX;

const EL_GENESIS_CONFIG: &str = include_str!("templates/genesis-config.yaml");
const CL_CONFIG: &str = include_str!("templates/config.yaml");
const MNEMONICS: &str = include_str!("templates/mnemonics.yaml");

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Renders the generator's `values.env` for `chain`.
pub fn values_env(chain: &ChainConfig) -> String {
    let values = [
        ("PRESET_BASE", "\"mainnet\"".to_string()),
        ("CHAIN_ID", format!("\"{}\"", chain.chain_id)),
        ("DEPOSIT_CONTRACT_ADDRESS", format!("\"{DEPOSIT_CONTRACT_ADDRESS}\"")),
        ("EL_AND_CL_MNEMONIC", format!("\"{GENESIS_MNEMONIC}\"")),
        ("CL_EXEC_BLOCK", "\"0\"".to_string()),
        ("SLOT_DURATION_IN_SECONDS", chain.seconds_per_slot.to_string()),
        ("NUMBER_OF_VALIDATORS", chain.validator_count.to_string()),
        ("GENESIS_FORK_VERSION", "\"0x10000038\"".to_string()),
        ("ALTAIR_FORK_VERSION", "\"0x20000038\"".to_string()),
        ("BELLATRIX_FORK_VERSION", "\"0x30000038\"".to_string()),
        ("CAPELLA_FORK_VERSION", "\"0x40000038\"".to_string()),
        ("CAPELLA_FORK_EPOCH", "\"0\"".to_string()),
        ("DENEB_FORK_VERSION", "\"0x50000038\"".to_string()),
        ("DENEB_FORK_EPOCH", format!("\"{DENEB_FORK_EPOCH}\"")),
        ("ELECTRA_FORK_VERSION", "\"0x60000038\"".to_string()),
        ("ELECTRA_FORK_EPOCH", format!("\"{FAR_FUTURE_EPOCH}\"")),
        ("WITHDRAWAL_TYPE", "\"0x00\"".to_string()),
        ("WITHDRAWAL_ADDRESS", WITHDRAWAL_ADDRESS.to_string()),
        ("GENESIS_TIMESTAMP", chain.genesis_timestamp.to_string()),
        ("GENESIS_DELAY", chain.genesis_delay.to_string()),
        ("GENESIS_GASLIMIT", "30000000".to_string()),
        ("MAX_PER_EPOCH_ACTIVATION_CHURN_LIMIT", "\"8\"".to_string()),
        ("CHURN_LIMIT_QUOTIENT", "\"65536\"".to_string()),
        ("EJECTION_BALANCE", "16000000000".to_string()),
        ("SLOTS_PER_EPOCH", chain.slots_per_epoch.to_string()),
        ("PREMINE_ADDRS", chain.premine_addrs()),
        ("ETH1_FOLLOW_DISTANCE", "\"2048\"".to_string()),
        ("MIN_VALIDATOR_WITHDRAWABILITY_DELAY", "\"256\"".to_string()),
        ("SHARD_COMMITTEE_PERIOD", "\"256\"".to_string()),
        ("ADDITIONAL_PRELOADED_CONTRACTS", "\"{}\"".to_string()),
    ];

    let mut env = String::new();
    for (key, value) in values {
        let _ = writeln!(env, "export {key}={value}");
    }
    env
}

/// Produces execution and consensus genesis files from a chain config.
#[derive(Debug, Clone)]
pub struct GenesisGenerator {
    name: String,
    image: String,
    chain: ChainConfig,
    host_dir: PathBuf,
    networks: Vec<String>,
    timeout: Duration,
}

impl GenesisGenerator {
    /// Creates a generator writing into `host_dir`.
    pub fn new(chain: ChainConfig, host_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: unique_name("eth-genesis-generator"),
            image: GENESIS_GENERATOR_IMAGE.to_string(),
            chain,
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

    /// Sets how long generation may take.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the container spec.
    pub fn container_spec(&self) -> ContainerSpec {
        ContainerSpec::new(&self.name, &self.image, ContainerRole::GenesisGenerator)
            .with_platform(FALLBACK_PLATFORM)
            .with_cmd(["all"])
            .with_file("/config/values.env", values_env(&self.chain))
            .with_file("/config/el/genesis-config.yaml", EL_GENESIS_CONFIG)
            .with_file("/config/cl/config.yaml", CL_CONFIG)
            .with_file("/config/cl/mnemonics.yaml", MNEMONICS)
            .with_mount(&self.host_dir, GENERATED_DATA_DIR)
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

    fn chain() -> ChainConfig {
        let mut chain = ChainConfig::default().with_chain_id(2337).with_validator_count(4);
        chain.genesis_timestamp = 1_700_000_000;
        chain
    }

    #[test]
    fn test_values_env_carries_chain_parameters() {
        let env = values_env(&chain());
        assert!(env.contains("export CHAIN_ID=\"2337\"\n"));
        assert!(env.contains("export NUMBER_OF_VALIDATORS=4\n"));
        assert!(env.contains("export GENESIS_TIMESTAMP=1700000000\n"));
        assert!(env.contains("export SLOTS_PER_EPOCH=6\n"));
        assert!(env.contains(&format!("export EL_AND_CL_MNEMONIC=\"{GENESIS_MNEMONIC}\"")));
    }

    #[test]
    fn test_values_env_premines_funded_addresses() {
        let env = values_env(&chain().with_addresses_to_fund(["0x1234567890123456789012345678901234567890"]));
        assert!(env.contains("export PREMINE_ADDRS='\n  \"0x1234567890123456789012345678901234567890\": 1000000000ETH'\n"));
    }

    #[test]
    fn test_values_env_without_addresses() {
        let mut chain = chain();
        chain.addresses_to_fund.clear();
        assert!(values_env(&chain).contains("export PREMINE_ADDRS={}\n"));
    }

    #[test]
    fn test_spec_copies_config_files() {
        let spec = GenesisGenerator::new(chain(), "/tmp/metadata").container_spec();
        let paths: Vec<_> = spec.files().iter().map(|file| file.path.as_str()).collect();
        assert!(paths.contains(&"/config/values.env"));
        assert_eq!(spec.cmd(), &["all".to_string()]);
        assert_eq!(spec.mounts()[0].container, GENERATED_DATA_DIR);
        assert_eq!(spec.platform(), Some(FALLBACK_PLATFORM));
    }
}
