//! Network configuration: chain version, client kinds and chain parameters.

mod accounts;
pub use accounts::{
    Account, DEFAULT_FUNDED_ACCOUNTS, TEST_MNEMONIC, default_funding_addresses, derive_account,
    test_accounts,
};

mod chain;
pub use chain::{
    ChainConfig, DEFAULT_CHAIN_ID, DEFAULT_GENESIS_DELAY, DEFAULT_SECONDS_PER_SLOT,
    DEFAULT_SLOTS_PER_EPOCH, DEFAULT_VALIDATOR_COUNT,
};

mod jwt;
pub use jwt::{random_jwt_secret, random_jwt_secret_hex};

mod layers;
pub use layers::{ConsensusLayer, EthereumVersion, ExecutionLayer, NodeLogLevel};

/// Environment variable naming a persisted topology to reattach to.
pub const CONFIG_ENV_VAR: &str = "PRIVATE_ETHEREUM_NETWORK_CONFIG_PATH";
