//! End-to-end startup against a local Docker daemon.
//!
//! Run with `cargo test -p eth-devnet -- --ignored`.

use std::time::Duration;

use alloy_provider::{Provider, RootProvider};
use eth_devnet::{
    ConsensusLayer, ContainerRole, EndpointKind, EthereumVersion, ExecutionLayer, NetworkBuilder,
    NetworkTopology,
};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn container_command(name: &str) -> eyre::Result<Vec<String>> {
    let output =
        Command::new("docker").args(["inspect", "--format", "{{json .Config.Cmd}}", name]).output().await?;
    eyre::ensure!(output.status.success(), "docker inspect {name} failed");
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pre_merge_geth_serves_rpc() -> eyre::Result<()> {
    init_tracing();
    let cancel = CancellationToken::new();
    let network = NetworkBuilder::new()
        .with_ethereum_version(EthereumVersion::Eth1)
        .with_execution_layer(ExecutionLayer::Geth)
        .build()?
        .start(&cancel)
        .await?;

    let url = network.connection().http_url().unwrap_or_default().parse()?;
    let provider: RootProvider = RootProvider::new_http(url);
    assert_eq!(provider.get_chain_id().await?, network.connection().chain_id);

    network.wait_until_chain_is_ready(&cancel, Duration::from_secs(60)).await?;
    network.terminate().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_merged_network_reattaches_from_saved_topology() -> eyre::Result<()> {
    init_tracing();
    let cancel = CancellationToken::new();
    let first = NetworkBuilder::new()
        .with_ethereum_version(EthereumVersion::Eth2)
        .with_execution_layer(ExecutionLayer::Geth)
        .with_consensus_layer(ConsensusLayer::Prysm)
        .build()?
        .start(&cancel)
        .await?;
    let dir = tempfile::tempdir()?;
    let path = first.topology().save_in(dir.path())?;
    let roles = first.topology().role_map();
    drop(first);

    let second = NetworkBuilder::new()
        .with_existing_topology(NetworkTopology::load(&path)?)
        .build()?
        .start(&cancel)
        .await?;

    assert_eq!(second.topology().role_map(), roles);
    assert!(second.component(ContainerRole::ConsensusValidator).is_some());
    second.terminate().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_merged_network_wires_public_and_internal_endpoints() -> eyre::Result<()> {
    init_tracing();
    let cancel = CancellationToken::new();
    let network = NetworkBuilder::new()
        .with_ethereum_version(EthereumVersion::Eth2)
        .with_execution_layer(ExecutionLayer::Geth)
        .with_consensus_layer(ConsensusLayer::Prysm)
        .build()?
        .start(&cancel)
        .await?;

    let ws_url = network.connection().ws_url().unwrap_or_default().to_string();
    let (socket, _) = tokio_tungstenite::connect_async(ws_url.as_str()).await?;
    drop(socket);

    let engine_url = network.execution().map(|exec| exec.internal_url(EndpointKind::Engine)).transpose()?;
    let beacon = network.component(ContainerRole::ConsensusLayer).map(|beacon| beacon.container_name().to_string());
    let (Some(engine_url), Some(beacon)) = (engine_url, beacon) else {
        eyre::bail!("merged network is missing its execution or beacon component");
    };
    let command = container_command(&beacon).await?;
    assert!(command.contains(&format!("--execution-endpoint={engine_url}")), "{command:?}");

    network.terminate().await?;
    Ok(())
}
