//! Docker networks and containers managed through the docker CLI.

use tokio::process::Command;
use tracing::{debug, info};

use crate::{error::RuntimeError, unique_name};

/// Prefix of generated network names.
pub const NETWORK_PREFIX: &str = "network";

/// Returns a fresh, randomly suffixed network name.
pub fn random_network_name() -> String {
    unique_name(NETWORK_PREFIX)
}

async fn docker(args: &[&str]) -> Result<std::process::Output, RuntimeError> {
    Command::new("docker")
        .args(args)
        .output()
        .await
        .map_err(|err| RuntimeError::new(format!("failed to run docker {}: {err}", args.join(" "))))
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Returns true if the network exists.
pub async fn network_exists(name: &str) -> bool {
    docker(&["network", "inspect", name]).await.map(|o| o.status.success()).unwrap_or(false)
}

/// Creates the network unless it already exists.
pub async fn ensure_network_exists(name: &str) -> Result<(), RuntimeError> {
    if network_exists(name).await {
        debug!(network = name, "Docker network already exists");
        return Ok(());
    }

    let output = docker(&["network", "create", name]).await?;
    if !output.status.success() {
        return Err(RuntimeError::new(format!(
            "failed to create docker network {name}: {}",
            stderr_of(&output)
        )));
    }

    info!(network = name, "Created docker network");
    Ok(())
}

/// Removes the network. A missing network is not an error.
pub async fn remove_network(name: &str) -> Result<(), RuntimeError> {
    let output = docker(&["network", "rm", name]).await?;
    let err = stderr_of(&output);
    if output.status.success() || is_not_found(&err) {
        return Ok(());
    }
    Err(RuntimeError::new(format!("failed to remove docker network {name}: {err}")))
}

/// Force-removes a container by name. A missing container is not an error.
pub async fn remove_container(name: &str) -> Result<(), RuntimeError> {
    let output = docker(&["rm", "-f", "-v", name]).await?;
    let err = stderr_of(&output);
    if output.status.success() || is_not_found(&err) {
        debug!(container = name, "Removed container");
        return Ok(());
    }
    Err(RuntimeError::new(format!("failed to remove container {name}: {err}")))
}

fn exec_args<'a>(container: &'a str, cmd: &'a [String]) -> Vec<&'a str> {
    let mut args = vec!["exec", container];
    args.extend(cmd.iter().map(String::as_str));
    args
}

/// Runs `cmd` inside `container`. Returns the command's exit code and stdout.
pub async fn exec_in_container(container: &str, cmd: &[String]) -> Result<(Option<i64>, Vec<u8>), RuntimeError> {
    let output = docker(&exec_args(container, cmd)).await?;
    debug!(container, cmd = ?cmd, status = ?output.status.code(), "Executed command in container");
    Ok((output.status.code().map(i64::from), output.stdout))
}

/// Whether a docker error message means the object does not exist.
pub fn is_not_found(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("no such container") || message.contains("not found")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::container("Error response from daemon: No such container: geth-abc", true)]
    #[case::network("Error response from daemon: network network-x not found", true)]
    #[case::other("Error response from daemon: conflict", false)]
    fn test_is_not_found(#[case] message: &str, #[case] expected: bool) {
        assert_eq!(is_not_found(message), expected);
    }

    #[test]
    fn test_exec_targets_container_then_command() {
        let cmd = vec!["sh".to_string(), "-c".to_string(), "test -f /data/genesis.json".to_string()];
        assert_eq!(exec_args("geth-abc", &cmd), ["exec", "geth-abc", "sh", "-c", "test -f /data/genesis.json"]);
    }

    #[test]
    fn test_random_network_names_are_distinct() {
        let name = random_network_name();
        assert!(name.starts_with("network-"));
        assert_ne!(name, random_network_name());
    }
}
