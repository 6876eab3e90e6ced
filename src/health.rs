//! Start-up health checks: bypassable with `--skip-health-checks`, but run by
//! default before the first collection cycle so misconfiguration fails fast.

use oracle_chain::RpcClient;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Runs start-up health checks and logs any failure as a warning. Never
/// returns an error: a misconfigured or unreachable endpoint is reported here
/// so an operator can see it early, but the only condition that should abort
/// a run is `NoDataCollected` after a full collection attempt.
pub async fn run_health_checks(config: &AppConfig, rpc: &RpcClient) {
    if let Err(e) = check_contract_hash_format(&config.oracle_contract_hash) {
        warn!(error = %e, "contract hash health check failed");
    }

    match rpc.get_block_count().await {
        Ok(height) => info!(block_height = height, "connected to Neo RPC endpoint"),
        Err(e) => warn!(error = %e, "failed to reach Neo RPC endpoint"),
    }
}

fn check_contract_hash_format(hash: &str) -> Result<(), String> {
    let stripped = hash
        .strip_prefix("0x")
        .ok_or_else(|| format!("contract hash {hash} must have a 0x prefix"))?;

    if stripped.len() != 40 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("contract hash {hash} must be 40 hex characters after 0x"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_contract_hash_passes() {
        let hash = format!("0x{}", "a".repeat(40));
        assert!(check_contract_hash_format(&hash).is_ok());
    }

    #[test]
    fn missing_prefix_fails() {
        let hash = "a".repeat(40);
        assert!(check_contract_hash_format(&hash).is_err());
    }

    #[test]
    fn wrong_length_fails() {
        let hash = format!("0x{}", "a".repeat(38));
        assert!(check_contract_hash_format(&hash).is_err());
    }
}
