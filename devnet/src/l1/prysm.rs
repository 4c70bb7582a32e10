//! Prysm beacon chain and validator command lines.

use crate::containers::{
    GENERATED_DATA_DIR, NODE_0_DIR, PRYSM_NODE_RPC_PORT, PRYSM_QUERY_RPC_PORT, jwt_secret_file,
    wallet_password_file,
};

pub(super) const BEACON_READY: &str = "Starting beacon node";
pub(super) const VALIDATOR_READY: &str = "Beacon chain started";

const DATA_DIR: &str = "/consensus-data";
/// Receives priority fees of proposed blocks.
pub(super) const FEE_RECIPIENT: &str = "0x8943545177806ED17B9F23F0a21ee5948eCaa776";

fn chain_config_file() -> String {
    format!("{GENERATED_DATA_DIR}/config.yaml")
}

pub(super) fn beacon_command(execution_endpoint: &str) -> Vec<String> {
    vec![
        "--accept-terms-of-use".to_string(),
        format!("--datadir={DATA_DIR}"),
        format!("--chain-config-file={}", chain_config_file()),
        format!("--genesis-state={GENERATED_DATA_DIR}/genesis.ssz"),
        format!("--execution-endpoint={execution_endpoint}"),
        "--rpc-host=0.0.0.0".to_string(),
        format!("--rpc-port={PRYSM_NODE_RPC_PORT}"),
        "--grpc-gateway-host=0.0.0.0".to_string(),
        format!("--grpc-gateway-port={PRYSM_QUERY_RPC_PORT}"),
        "--grpc-gateway-corsdomain=*".to_string(),
        format!("--suggested-fee-recipient={FEE_RECIPIENT}"),
        "--subscribe-all-subnets=true".to_string(),
        format!("--jwt-secret={}", jwt_secret_file()),
        "--contract-deployment-block=0".to_string(),
        "--minimum-peers-per-subnet=0".to_string(),
        "--min-sync-peers=0".to_string(),
        "--interop-eth1data-votes".to_string(),
    ]
}

pub(super) fn validator_command(beacon_rpc: &str) -> Vec<String> {
    vec![
        "--accept-terms-of-use".to_string(),
        format!("--chain-config-file={}", chain_config_file()),
        format!("--beacon-rpc-provider={beacon_rpc}"),
        format!("--datadir={DATA_DIR}"),
        format!("--suggested-fee-recipient={FEE_RECIPIENT}"),
        format!("--wallet-dir={NODE_0_DIR}/prysm"),
        format!("--wallet-password-file={}", wallet_password_file()),
    ]
}
