use super::execution::{ExecutionContext, ExecutionFlavor};
use crate::{
    config::{EthereumVersion, ExecutionLayer},
    containers::{EXECUTION_ENGINE_PORT, EXECUTION_HTTP_PORT, EXECUTION_WS_PORT, jwt_secret_file, keystore_dir},
    setup::GeneratedData,
};

const DATA_DIR: &str = "/nethermind/execution-data";
const MODULES: &str = "net,eth,consensus,subscribe,web3,admin,debug,txpool";

/// Nethermind.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nethermind;

impl ExecutionFlavor for Nethermind {
    fn layer(&self) -> ExecutionLayer {
        ExecutionLayer::Nethermind
    }

    fn command(&self, ctx: &ExecutionContext<'_>) -> Vec<String> {
        let mut args = vec![
            format!("--datadir={DATA_DIR}"),
            "--Init.WebSocketsEnabled=true".to_string(),
            "--JsonRpc.Enabled=true".to_string(),
            format!("--JsonRpc.EnabledModules={MODULES}"),
            "--JsonRpc.Host=0.0.0.0".to_string(),
            format!("--JsonRpc.Port={EXECUTION_HTTP_PORT}"),
            format!("--JsonRpc.WebSocketsPort={EXECUTION_WS_PORT}"),
            "--Network.MaxActivePeers=0".to_string(),
            format!("--log={}", ctx.log_level.as_str().to_uppercase()),
        ];

        match ctx.version {
            EthereumVersion::Eth1 => args.push("--config=spaceneth".to_string()),
            EthereumVersion::Eth2 => args.extend([
                format!("--Init.ChainSpecPath={}", GeneratedData::in_container().chainspec_path().display()),
                "--Init.DiscoveryEnabled=false".to_string(),
                "--JsonRpc.EngineHost=0.0.0.0".to_string(),
                format!("--JsonRpc.EnginePort={EXECUTION_ENGINE_PORT}"),
                format!("--JsonRpc.JwtSecretFile={}", jwt_secret_file()),
                format!("--KeyStore.KeyStoreDirectory={}", keystore_dir()),
                "--Sync.MaxAttemptsToUpdatePivot=0".to_string(),
            ]),
        }
        args
    }

    fn ready_pattern(&self, _version: EthereumVersion) -> &'static str {
        "Nethermind initialization completed"
    }

    fn chain_ready_pattern(&self, _version: EthereumVersion) -> &'static str {
        "(?i)(Received (new|ForkChoice)|Produced block)"
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
    fn test_merged_command_uses_chainspec() {
        let chain = ChainConfig::default();
        let ctx = ExecutionContext { version: EthereumVersion::Eth2, chain: &chain, log_level: NodeLogLevel::Info };
        let cmd = Nethermind.command(&ctx);
        assert!(cmd.contains(&"--Init.ChainSpecPath=/data/metadata/chainspec.json".to_string()));
        assert!(cmd.contains(&"--JsonRpc.JwtSecretFile=/data/metadata/jwtsecret".to_string()));
    }

    #[test]
    fn test_dev_chain_before_merge() {
        let chain = ChainConfig::default();
        let ctx = ExecutionContext { version: EthereumVersion::Eth1, chain: &chain, log_level: NodeLogLevel::Info };
        assert!(Nethermind.command(&ctx).contains(&"--config=spaceneth".to_string()));
    }
}
