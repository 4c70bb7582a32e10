use super::execution::{ExecutionContext, ExecutionFlavor};
use crate::{
    config::{EthereumVersion, ExecutionLayer},
    containers::{EXECUTION_ENGINE_PORT, EXECUTION_HTTP_PORT, EXECUTION_WS_PORT, jwt_secret_file},
    setup::GeneratedData,
};

const DATA_DIR: &str = "/data/reth";
const APIS: &str = "admin,eth,web3,net,rpc,debug,txpool";

/// Reth. Only runs merged chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reth;

impl ExecutionFlavor for Reth {
    fn layer(&self) -> ExecutionLayer {
        ExecutionLayer::Reth
    }

    fn entrypoint(&self, _version: EthereumVersion) -> Option<&'static str> {
        Some("reth")
    }

    fn command(&self, ctx: &ExecutionContext<'_>) -> Vec<String> {
        vec![
            "node".to_string(),
            format!("--chain={}", GeneratedData::in_container().genesis_path().display()),
            format!("--datadir={DATA_DIR}"),
            "--http".to_string(),
            "--http.addr=0.0.0.0".to_string(),
            format!("--http.port={EXECUTION_HTTP_PORT}"),
            format!("--http.api={APIS}"),
            "--http.corsdomain=*".to_string(),
            "--ws".to_string(),
            "--ws.addr=0.0.0.0".to_string(),
            format!("--ws.port={EXECUTION_WS_PORT}"),
            format!("--ws.api={APIS}"),
            "--authrpc.addr=0.0.0.0".to_string(),
            format!("--authrpc.port={EXECUTION_ENGINE_PORT}"),
            format!("--authrpc.jwtsecret={}", jwt_secret_file()),
            "--disable-discovery".to_string(),
            format!("-{}", "v".repeat(usize::from(ctx.log_level.verbosity()))),
        ]
    }

    fn ready_pattern(&self, _version: EthereumVersion) -> &'static str {
        "RPC HTTP server started"
    }

    fn chain_ready_pattern(&self, _version: EthereumVersion) -> &'static str {
        "(Block added to canonical chain|Canonical chain committed)"
    }
}
