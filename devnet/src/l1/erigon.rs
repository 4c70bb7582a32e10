use super::execution::{ExecutionContext, ExecutionFlavor};
use crate::{
    config::{EthereumVersion, ExecutionLayer},
    containers::{EXECUTION_ENGINE_PORT, EXECUTION_HTTP_PORT, jwt_secret_file},
    setup::GeneratedData,
};

const DATA_DIR: &str = "/home/erigon/execution-data";
const APIS: &str = "admin,debug,web3,eth,txpool,net";

/// Erigon. Serves WebSocket on the HTTP port.
#[derive(Debug, Clone, Copy, Default)]
pub struct Erigon;

impl ExecutionFlavor for Erigon {
    fn layer(&self) -> ExecutionLayer {
        ExecutionLayer::Erigon
    }

    fn entrypoint(&self, version: EthereumVersion) -> Option<&'static str> {
        version.is_merged().then_some("sh")
    }

    fn command(&self, ctx: &ExecutionContext<'_>) -> Vec<String> {
        let mut args = vec![
            format!("--datadir={DATA_DIR}"),
            "--http".to_string(),
            "--http.addr=0.0.0.0".to_string(),
            format!("--http.port={EXECUTION_HTTP_PORT}"),
            "--http.vhosts=*".to_string(),
            "--http.corsdomain=*".to_string(),
            format!("--http.api={APIS}"),
            "--ws".to_string(),
            "--nodiscover".to_string(),
            "--rpc.allow-unprotected-txs".to_string(),
            "--rpc.txfeecap=0".to_string(),
            format!("--verbosity={}", ctx.log_level.as_str()),
        ];

        if !ctx.version.is_merged() {
            args.extend(["--chain=dev".to_string(), "--mine".to_string(), "--dev.period=1".to_string()]);
            return args;
        }

        args.extend([
            format!("--networkid={}", ctx.chain.chain_id),
            "--authrpc.addr=0.0.0.0".to_string(),
            format!("--authrpc.port={EXECUTION_ENGINE_PORT}"),
            "--authrpc.vhosts=*".to_string(),
            format!("--authrpc.jwtsecret={}", jwt_secret_file()),
        ]);
        let genesis = GeneratedData::in_container().genesis_path();
        vec![
            "-c".to_string(),
            format!("erigon init --datadir={DATA_DIR} {} && exec erigon {}", genesis.display(), args.join(" ")),
        ]
    }

    fn ready_pattern(&self, _version: EthereumVersion) -> &'static str {
        "HTTP endpoint opened"
    }

    fn chain_ready_pattern(&self, version: EthereumVersion) -> &'static str {
        match version {
            EthereumVersion::Eth1 => "(?i)(sealed new block|Imported new chain segment)",
            EthereumVersion::Eth2 => "(?i)fork ?choice update",
        }
    }

    fn ws_port(&self) -> u16 {
        EXECUTION_HTTP_PORT
    }

    fn chain_ready_timeout_factor(&self) -> u32 {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainConfig, NodeLogLevel};

    #[test]
    fn test_ws_is_served_on_http_port() {
        assert_eq!(Erigon.ws_port(), EXECUTION_HTTP_PORT);
    }

    #[test]
    fn test_merged_command_initializes_genesis_first() {
        let chain = ChainConfig::default();
        let ctx = ExecutionContext { version: EthereumVersion::Eth2, chain: &chain, log_level: NodeLogLevel::Info };
        let cmd = Erigon.command(&ctx);
        assert!(cmd[1].starts_with("erigon init --datadir=/home/erigon/execution-data /data/metadata/genesis.json"));
        assert!(cmd[1].contains("--verbosity=info"));
    }
}
