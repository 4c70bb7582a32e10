//! Container roles, well-known ports and in-container paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role a container plays in a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerRole {
    /// Execution client.
    ExecutionLayer,
    /// Consensus beacon node.
    ConsensusLayer,
    /// Consensus validator client.
    ConsensusValidator,
    /// One-shot genesis generator.
    GenesisGenerator,
    /// One-shot validator key generator.
    ValKeysGenerator,
    /// One-shot helper writing secrets next to the generated genesis.
    AfterGenesisHelper,
}

impl ContainerRole {
    /// Returns true for setup containers that exit once their work is done.
    pub const fn is_ephemeral(self) -> bool {
        matches!(self, Self::GenesisGenerator | Self::ValKeysGenerator | Self::AfterGenesisHelper)
    }

    /// Returns the snake case role name used in topology files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExecutionLayer => "execution_layer",
            Self::ConsensusLayer => "consensus_layer",
            Self::ConsensusValidator => "consensus_validator",
            Self::GenesisGenerator => "genesis_generator",
            Self::ValKeysGenerator => "val_keys_generator",
            Self::AfterGenesisHelper => "after_genesis_helper",
        }
    }
}

impl fmt::Display for ContainerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON-RPC HTTP port of execution clients.
pub const EXECUTION_HTTP_PORT: u16 = 8545;
/// JSON-RPC WebSocket port of execution clients.
pub const EXECUTION_WS_PORT: u16 = 8546;
/// Authenticated engine API port of execution clients.
pub const EXECUTION_ENGINE_PORT: u16 = 8551;

/// Prysm beacon gRPC gateway (query) port.
pub const PRYSM_QUERY_RPC_PORT: u16 = 3500;
/// Prysm beacon RPC port used by validators.
pub const PRYSM_NODE_RPC_PORT: u16 = 4000;
/// Lighthouse beacon HTTP API port.
pub const LIGHTHOUSE_HTTP_PORT: u16 = 4052;

/// Mount point of the generated data host directory.
pub const GENERATED_DATA_DIR: &str = "/data/metadata";
/// Mount point of the validator keys host directory.
pub const VALIDATOR_KEYS_DIR: &str = "/keys";
/// Keystores of the single validator node.
pub const NODE_0_DIR: &str = "/keys/node-0";

/// Password of the validator wallet written by the after-genesis helper.
pub const WALLET_PASSWORD: &str = "password";

/// Validator wallet password file inside [`GENERATED_DATA_DIR`].
pub fn wallet_password_file() -> String {
    format!("{GENERATED_DATA_DIR}/wallet_password.txt")
}

/// Engine API JWT secret file inside [`GENERATED_DATA_DIR`].
pub fn jwt_secret_file() -> String {
    format!("{GENERATED_DATA_DIR}/jwtsecret")
}

/// Execution account keystore directory inside [`GENERATED_DATA_DIR`].
pub fn keystore_dir() -> String {
    format!("{GENERATED_DATA_DIR}/keystore")
}

/// Execution account password file inside [`GENERATED_DATA_DIR`].
pub fn account_password_file() -> String {
    format!("{GENERATED_DATA_DIR}/password.txt")
}
