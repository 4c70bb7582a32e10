#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod utils;
pub use utils::unique_name;

pub mod builder;
pub mod component;
pub mod config;
pub mod containers;
pub mod error;
pub mod images;
pub mod l1;
pub mod launcher;
pub mod network;
pub mod rpc;
pub mod runtime;
pub mod setup;
pub mod topology;
pub mod wait;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use builder::{EthereumNetwork, NetworkBuilder, RunningNetwork};
pub use component::{ComponentHandle, EndpointKind};
pub use config::{ChainConfig, ConsensusLayer, EthereumVersion, ExecutionLayer, NodeLogLevel};
pub use containers::ContainerRole;
pub use error::{DevnetError, PersistenceError, RuntimeError, Stage, ValidationError};
pub use launcher::{Launcher, NaiveRetrier, PlatformImageRetrier, RetryPolicy};
pub use rpc::NetworkConnection;
pub use runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};
pub use topology::NetworkTopology;
