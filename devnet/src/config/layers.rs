//! Chain version and client kinds.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Whether the chain runs pre-merge or with a consensus client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EthereumVersion {
    /// Pre-merge chain produced by the execution client alone.
    Eth1,
    /// Merged chain driven by a beacon node over the engine API.
    Eth2,
}

impl EthereumVersion {
    /// Returns true for the merged version.
    pub const fn is_merged(self) -> bool {
        matches!(self, Self::Eth2)
    }
}

impl fmt::Display for EthereumVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eth1 => "eth1",
            Self::Eth2 => "eth2",
        })
    }
}

/// Execution client implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionLayer {
    /// go-ethereum.
    Geth,
    /// Hyperledger Besu.
    Besu,
    /// Erigon.
    Erigon,
    /// Nethermind.
    Nethermind,
    /// Reth.
    Reth,
}

impl ExecutionLayer {
    /// All execution layers, in inference order.
    pub const ALL: [Self; 5] = [Self::Geth, Self::Besu, Self::Erigon, Self::Nethermind, Self::Reth];

    /// Returns the lowercase client name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Geth => "geth",
            Self::Besu => "besu",
            Self::Erigon => "erigon",
            Self::Nethermind => "nethermind",
            Self::Reth => "reth",
        }
    }
}

impl fmt::Display for ExecutionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consensus client implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusLayer {
    /// Prysm beacon node and validator.
    Prysm,
    /// Lighthouse beacon node and validator.
    Lighthouse,
}

impl fmt::Display for ConsensusLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Prysm => "prysm",
            Self::Lighthouse => "lighthouse",
        })
    }
}

/// Log verbosity passed to execution clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLogLevel {
    /// Most verbose.
    Trace,
    /// Debug output.
    Debug,
    /// Default verbosity.
    #[default]
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl NodeLogLevel {
    /// Returns the lowercase level name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Returns the numeric verbosity used by geth-style `--verbosity` flags.
    pub const fn verbosity(self) -> u8 {
        match self {
            Self::Trace => 5,
            Self::Debug => 4,
            Self::Info => 3,
            Self::Warn => 2,
            Self::Error => 1,
        }
    }
}

impl fmt::Display for NodeLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeLogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ValidationError::InvalidLogLevel(s.to_string())),
        }
    }
}
