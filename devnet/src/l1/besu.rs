use super::execution::{ExecutionContext, ExecutionFlavor};
use crate::{
    config::{EthereumVersion, ExecutionLayer},
    containers::{EXECUTION_ENGINE_PORT, EXECUTION_HTTP_PORT, EXECUTION_WS_PORT, jwt_secret_file},
    setup::GeneratedData,
};

const DATA_DIR: &str = "/opt/besu/execution-data";
const APIS: &str = "ADMIN,ETH,NET,DEBUG,TXPOOL,WEB3";
/// Well-known dev mode coinbase.
const DEV_COINBASE: &str = "0xfe3b557e8fb62b89f4916b721be55ceb828dbd73";

/// Hyperledger Besu.
#[derive(Debug, Clone, Copy, Default)]
pub struct Besu;

impl ExecutionFlavor for Besu {
    fn layer(&self) -> ExecutionLayer {
        ExecutionLayer::Besu
    }

    fn command(&self, ctx: &ExecutionContext<'_>) -> Vec<String> {
        let mut args = vec![
            format!("--data-path={DATA_DIR}"),
            "--host-allowlist=*".to_string(),
            "--rpc-http-enabled=true".to_string(),
            "--rpc-http-host=0.0.0.0".to_string(),
            format!("--rpc-http-port={EXECUTION_HTTP_PORT}"),
            format!("--rpc-http-api={APIS}"),
            "--rpc-http-cors-origins=*".to_string(),
            "--rpc-ws-enabled=true".to_string(),
            "--rpc-ws-host=0.0.0.0".to_string(),
            format!("--rpc-ws-port={EXECUTION_WS_PORT}"),
            format!("--rpc-ws-api={APIS}"),
            "--rpc-tx-feecap=0".to_string(),
            format!("--logging={}", ctx.log_level.as_str().to_uppercase()),
        ];

        match ctx.version {
            EthereumVersion::Eth1 => args.extend([
                "--network=dev".to_string(),
                "--miner-enabled".to_string(),
                format!("--miner-coinbase={DEV_COINBASE}"),
            ]),
            EthereumVersion::Eth2 => args.extend([
                format!("--genesis-file={}", GeneratedData::in_container().besu_genesis_path().display()),
                format!("--network-id={}", ctx.chain.chain_id),
                "--engine-rpc-enabled=true".to_string(),
                format!("--engine-rpc-port={EXECUTION_ENGINE_PORT}"),
                format!("--engine-jwt-secret={}", jwt_secret_file()),
                "--engine-host-allowlist=*".to_string(),
                "--sync-mode=FULL".to_string(),
                "--data-storage-format=BONSAI".to_string(),
            ]),
        }
        args
    }

    fn ready_pattern(&self, _version: EthereumVersion) -> &'static str {
        "Ethereum main loop is up"
    }

    fn chain_ready_pattern(&self, _version: EthereumVersion) -> &'static str {
        "(Imported|Produced) #[1-9]"
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
    fn test_merged_command_uses_besu_genesis() {
        let chain = ChainConfig::default();
        let ctx = ExecutionContext { version: EthereumVersion::Eth2, chain: &chain, log_level: NodeLogLevel::Warn };
        let cmd = Besu.command(&ctx);
        assert!(cmd.contains(&"--genesis-file=/data/metadata/besu.json".to_string()));
        assert!(cmd.contains(&"--logging=WARN".to_string()));
        assert!(!cmd.contains(&"--network=dev".to_string()));
    }
}
