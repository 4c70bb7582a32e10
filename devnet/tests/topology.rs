//! Tests for persisting a network topology and reattaching from it.

use eth_devnet::{
    ChainConfig, ConsensusLayer, ContainerRole, DevnetError, EthereumVersion, ExecutionLayer,
    NetworkBuilder, NetworkTopology, PersistenceError, Stage,
};

fn saved_topology() -> NetworkTopology {
    let mut topology = NetworkTopology {
        ethereum_version: Some(EthereumVersion::Eth1),
        execution_layer: Some(ExecutionLayer::Besu),
        docker_network_names: vec!["network-test".to_string()],
        chain_config: ChainConfig::default().with_chain_id(4242),
        ..Default::default()
    };
    topology.record(ContainerRole::ExecutionLayer, "besu-abc123");
    topology
}

#[test]
fn test_reattach_keeps_recorded_chain_and_containers() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = saved_topology().save_in(dir.path())?;

    let network = NetworkBuilder::new().with_existing_topology(NetworkTopology::load(&path)?).build()?;

    let topology = network.topology();
    assert!(topology.was_reattached);
    assert_eq!(topology.chain_config.chain_id, 4242);
    assert_eq!(topology.container(ContainerRole::ExecutionLayer), Some("besu-abc123"));
    assert_eq!(topology.docker_network_names, vec!["network-test".to_string()]);
    Ok(())
}

#[test]
fn test_explicit_options_override_saved_topology() -> eyre::Result<()> {
    let network = NetworkBuilder::new()
        .with_existing_topology(saved_topology())
        .with_wait_for_finalization(true)
        .with_chain_config(ChainConfig::unset().with_chain_id(7))
        .build()?;

    assert!(network.topology().wait_for_finalization);
    assert_eq!(network.topology().chain_config.chain_id, 7);
    Ok(())
}

#[test]
fn test_reattach_validates_saved_layers() {
    let mut topology = saved_topology();
    topology.consensus_layer = Some(ConsensusLayer::Prysm);

    let err = NetworkBuilder::new().with_existing_topology(topology).build().unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Validated));
}

#[test]
fn test_incomplete_file_cannot_be_loaded() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut topology = saved_topology();
    topology.containers.clear();
    let path = topology.save_in(dir.path())?;

    let err = NetworkTopology::load(&path).unwrap_err();

    assert!(matches!(err, PersistenceError::MissingField { field: "containers", .. }));
    let err: DevnetError = err.into();
    assert!(err.to_string().contains("containers"));
    Ok(())
}
