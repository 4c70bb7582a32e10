use super::execution::{ExecutionContext, ExecutionFlavor};
use crate::{
    config::{EthereumVersion, ExecutionLayer},
    containers::{EXECUTION_ENGINE_PORT, EXECUTION_HTTP_PORT, EXECUTION_WS_PORT, jwt_secret_file},
    setup::GeneratedData,
};

const DATA_DIR: &str = "/execution-data";
const APIS: &str = "admin,debug,web3,eth,txpool,net";

/// Geth, in dev mode before the merge and following a beacon node after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Geth;

impl Geth {
    fn rpc_args(ctx: &ExecutionContext<'_>) -> Vec<String> {
        vec![
            "--http".to_string(),
            "--http.addr=0.0.0.0".to_string(),
            format!("--http.port={EXECUTION_HTTP_PORT}"),
            "--http.vhosts=*".to_string(),
            "--http.corsdomain=*".to_string(),
            format!("--http.api={APIS}"),
            "--ws".to_string(),
            "--ws.addr=0.0.0.0".to_string(),
            format!("--ws.port={EXECUTION_WS_PORT}"),
            "--ws.origins=*".to_string(),
            format!("--ws.api={APIS}"),
            "--rpc.allow-unprotected-txs".to_string(),
            "--rpc.txfeecap=0".to_string(),
            format!("--verbosity={}", ctx.log_level.verbosity()),
        ]
    }
}

impl ExecutionFlavor for Geth {
    fn layer(&self) -> ExecutionLayer {
        ExecutionLayer::Geth
    }

    fn entrypoint(&self, version: EthereumVersion) -> Option<&'static str> {
        version.is_merged().then_some("sh")
    }

    fn command(&self, ctx: &ExecutionContext<'_>) -> Vec<String> {
        if !ctx.version.is_merged() {
            let mut args = vec!["--dev".to_string(), "--dev.period=1".to_string(), format!("--datadir={DATA_DIR}")];
            args.extend(Self::rpc_args(ctx));
            return args;
        }

        let genesis = GeneratedData::in_container().genesis_path();
        let mut geth = vec![
            "geth".to_string(),
            format!("--datadir={DATA_DIR}"),
            format!("--networkid={}", ctx.chain.chain_id),
            "--syncmode=full".to_string(),
            "--nodiscover".to_string(),
            "--authrpc.addr=0.0.0.0".to_string(),
            format!("--authrpc.port={EXECUTION_ENGINE_PORT}"),
            "--authrpc.vhosts=*".to_string(),
            format!("--authrpc.jwtsecret={}", jwt_secret_file()),
        ];
        geth.extend(Self::rpc_args(ctx));
        vec![
            "-c".to_string(),
            format!("geth init --datadir={DATA_DIR} {} && exec {}", genesis.display(), geth.join(" ")),
        ]
    }

    fn ready_pattern(&self, _version: EthereumVersion) -> &'static str {
        "WebSocket enabled"
    }

    fn chain_ready_pattern(&self, version: EthereumVersion) -> &'static str {
        match version {
            EthereumVersion::Eth1 => "(Successfully sealed new block|Commit new sealing work)",
            EthereumVersion::Eth2 => "Chain head was updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainConfig, NodeLogLevel};

    #[test]
    fn test_merged_command_initializes_genesis_first() {
        let chain = ChainConfig::default();
        let ctx = ExecutionContext { version: EthereumVersion::Eth2, chain: &chain, log_level: NodeLogLevel::Debug };
        let cmd = Geth.command(&ctx);
        assert_eq!(cmd[0], "-c");
        assert!(cmd[1].starts_with("geth init --datadir=/execution-data /data/metadata/genesis.json && exec geth"));
        assert!(cmd[1].contains("--authrpc.jwtsecret=/data/metadata/jwtsecret"));
        assert!(cmd[1].contains("--networkid=1337"));
        assert!(cmd[1].contains("--verbosity=4"));
        assert_eq!(Geth.entrypoint(EthereumVersion::Eth2), Some("sh"));
    }

    #[test]
    fn test_dev_mode_before_merge() {
        let chain = ChainConfig::default();
        let ctx = ExecutionContext { version: EthereumVersion::Eth1, chain: &chain, log_level: NodeLogLevel::Info };
        let cmd = Geth.command(&ctx);
        assert_eq!(cmd[0], "--dev");
        assert!(Geth.entrypoint(EthereumVersion::Eth1).is_none());
    }
}
