//! Lighthouse beacon node and validator client command lines.

use super::prysm::FEE_RECIPIENT;
use crate::containers::{GENERATED_DATA_DIR, LIGHTHOUSE_HTTP_PORT, NODE_0_DIR, jwt_secret_file};

pub(super) const ENTRYPOINT: &str = "lighthouse";
pub(super) const BEACON_READY: &str = "HTTP API started";
pub(super) const VALIDATOR_READY: &str = "Initialized beacon node connections";

const BEACON_DATA_DIR: &str = "/consensus-data/beacon";
const VALIDATOR_DATA_DIR: &str = "/consensus-data/validator";

pub(super) fn beacon_command(execution_endpoint: &str) -> Vec<String> {
    vec![
        "bn".to_string(),
        format!("--testnet-dir={GENERATED_DATA_DIR}"),
        format!("--datadir={BEACON_DATA_DIR}"),
        "--enable-private-discovery".to_string(),
        "--disable-peer-scoring".to_string(),
        "--staking".to_string(),
        "--http".to_string(),
        "--http-address=0.0.0.0".to_string(),
        format!("--http-port={LIGHTHOUSE_HTTP_PORT}"),
        "--http-allow-origin=*".to_string(),
        "--target-peers=0".to_string(),
        format!("--suggested-fee-recipient={FEE_RECIPIENT}"),
        format!("--execution-endpoint={execution_endpoint}"),
        format!("--execution-jwt={}", jwt_secret_file()),
    ]
}

pub(super) fn validator_command(beacon_http: &str) -> Vec<String> {
    vec![
        "vc".to_string(),
        format!("--testnet-dir={GENERATED_DATA_DIR}"),
        format!("--datadir={VALIDATOR_DATA_DIR}"),
        format!("--validators-dir={NODE_0_DIR}/keys"),
        format!("--secrets-dir={NODE_0_DIR}/secrets"),
        format!("--beacon-nodes={beacon_http}"),
        format!("--suggested-fee-recipient={FEE_RECIPIENT}"),
        "--init-slashing-protection".to_string(),
    ]
}
