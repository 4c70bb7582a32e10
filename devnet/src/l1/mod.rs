//! Execution and consensus clients of the L1 network.

mod besu;
pub use besu::Besu;

mod consensus;
pub use consensus::{BeaconNode, ValidatorClient};

mod erigon;
pub use erigon::Erigon;

mod execution;
pub use execution::{ExecutionClient, ExecutionContext, ExecutionFlavor, ExecutionNode};

mod geth;
pub use geth::Geth;

mod lighthouse;

mod nethermind;
pub use nethermind::Nethermind;

mod prysm;

mod reth;
pub use reth::Reth;

use crate::config::ExecutionLayer;

/// Returns the client-specific half of an execution node.
pub fn flavor_for(layer: ExecutionLayer) -> Box<dyn ExecutionFlavor> {
    match layer {
        ExecutionLayer::Geth => Box::new(Geth),
        ExecutionLayer::Besu => Box::new(Besu),
        ExecutionLayer::Erigon => Box::new(Erigon),
        ExecutionLayer::Nethermind => Box::new(Nethermind),
        ExecutionLayer::Reth => Box::new(Reth),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use rstest::rstest;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        component::EndpointKind,
        config::{ChainConfig, EthereumVersion},
        containers::{ContainerRole, EXECUTION_ENGINE_PORT, EXECUTION_HTTP_PORT, EXECUTION_WS_PORT},
        error::DevnetError,
        launcher::Launcher,
        test_utils::{MockContainer, MockRuntime, serve_http, serve_ws},
    };

    #[test]
    fn test_flavor_matches_layer() {
        for layer in ExecutionLayer::ALL {
            assert_eq!(flavor_for(layer).layer(), layer);
        }
    }

    #[test]
    fn test_merged_node_needs_generated_data() {
        let node = ExecutionNode::new(flavor_for(ExecutionLayer::Geth), EthereumVersion::Eth2, ChainConfig::default());
        let err = node.container_spec().unwrap_err();
        assert!(matches!(err, DevnetError::DependencyResolution { role: ContainerRole::GenesisGenerator, .. }));
    }

    #[test]
    fn test_pre_merge_node_has_no_engine_port() {
        let node = ExecutionNode::new(flavor_for(ExecutionLayer::Besu), EthereumVersion::Eth1, ChainConfig::default());
        let spec = node.container_spec().unwrap();
        assert!(!spec.ports().contains(&EXECUTION_ENGINE_PORT));
        assert!(spec.mounts().is_empty());
        assert_eq!(spec.image(), "hyperledger/besu:23.10.3");
    }

    #[test]
    fn test_reattached_node_reuses_container() {
        let node = ExecutionNode::new(flavor_for(ExecutionLayer::Nethermind), EthereumVersion::Eth2, ChainConfig::default())
            .with_generated_data("/tmp/m")
            .with_existing_container("nethermind-old");
        let spec = node.container_spec().unwrap();
        assert_eq!(spec.name(), "nethermind-old");
        assert!(spec.reuse());
    }

    #[rstest]
    #[case::pre_merge(EthereumVersion::Eth1)]
    #[case::merged(EthereumVersion::Eth2)]
    fn test_fresh_node_outlives_its_process(#[case] version: EthereumVersion) {
        let node = ExecutionNode::new(flavor_for(ExecutionLayer::Geth), version, ChainConfig::default())
            .with_generated_data("/tmp/m");
        let spec = node.container_spec().unwrap();
        assert!(spec.reuse());
    }

    async fn runtime_with_execution(logs: &str) -> Arc<MockRuntime> {
        let runtime = Arc::new(MockRuntime::new());
        runtime.set_container(
            ContainerRole::ExecutionLayer,
            MockContainer::template(ContainerRole::ExecutionLayer)
                .with_logs(logs)
                .with_port(EXECUTION_HTTP_PORT, serve_http().await)
                .with_port(EXECUTION_WS_PORT, serve_ws().await),
        );
        runtime
    }

    #[rstest]
    #[case::geth(ExecutionLayer::Geth, "WebSocket enabled\nChain head was updated number=1\n")]
    #[case::reth(ExecutionLayer::Reth, "RPC HTTP server started\nBlock added to canonical chain number=1\n")]
    #[tokio::test]
    async fn test_start_resolves_endpoints(#[case] layer: ExecutionLayer, #[case] logs: &str) {
        let runtime = runtime_with_execution(logs).await;
        let launcher = Launcher::new(runtime.clone());
        let cancel = CancellationToken::new();
        let mut node = ExecutionNode::new(flavor_for(layer), EthereumVersion::Eth2, ChainConfig::default())
            .with_generated_data("/tmp/m");

        node.start(&launcher, &cancel).await.unwrap();
        node.wait_until_chain_is_ready(&cancel, Duration::from_secs(5)).await.unwrap();

        let handle = node.handle().unwrap();
        assert_eq!(handle.internal_url(EndpointKind::Engine).unwrap(), format!("http://{}:8551", node.container_name()));
        assert!(handle.external_url(EndpointKind::Ws).unwrap().starts_with("ws://127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_chain_ready_times_out_without_blocks() {
        let runtime = runtime_with_execution("WebSocket enabled\n").await;
        let launcher = Launcher::new(runtime);
        let cancel = CancellationToken::new();
        let mut node = ExecutionNode::new(flavor_for(ExecutionLayer::Geth), EthereumVersion::Eth2, ChainConfig::default())
            .with_generated_data("/tmp/m");
        node.start(&launcher, &cancel).await.unwrap();

        let err = node.wait_until_chain_is_ready(&cancel, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, DevnetError::ReadinessTimeout { .. }));
    }

    #[tokio::test]
    async fn test_chain_ready_before_start_is_a_resolution_error() {
        let node = ExecutionNode::new(flavor_for(ExecutionLayer::Geth), EthereumVersion::Eth1, ChainConfig::default());
        let err = node.wait_until_chain_is_ready(&CancellationToken::new(), Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, DevnetError::DependencyResolution { role: ContainerRole::ExecutionLayer, .. }));
    }
}
