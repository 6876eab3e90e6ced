//! Minimal JSON-RPC 2.0 client for the Neo N3 node methods the submitter needs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{ChainError, ChainResult};
use crate::types::{InvokeResult, Nep17BalancesResult, RpcRequest, RpcResponse};

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:10332".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Thin wrapper over a single Neo N3 RPC node. Does not itself retry; callers
/// (the submitter) own the retry/backoff policy since only some RPC failures
/// are safe to retry.
pub struct RpcClient {
    http: reqwest::Client,
    config: RpcClientConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> ChainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChainError::Transport {
                method: "client_build".to_string(),
                source: e,
            })?;
        Ok(Self {
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Transport {
                method: method.to_string(),
                source: e,
            })?;

        let body: RpcResponse<T> = response.json().await.map_err(|e| ChainError::Transport {
            method: method.to_string(),
            source: e,
        })?;

        if let Some(err) = body.error {
            return Err(ChainError::RpcError {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        body.result.ok_or_else(|| ChainError::MalformedResponse {
            method: method.to_string(),
            detail: "missing result and error".to_string(),
        })
    }

    /// Current block height, used to compute `valid_until_block`.
    pub async fn get_block_count(&self) -> ChainResult<u64> {
        self.call("getblockcount", json!([])).await
    }

    /// Simulates invoking a contract method without broadcasting, used to
    /// estimate gas consumption and sanity-check the script before signing.
    pub async fn invoke_function(
        &self,
        script_hash: &str,
        operation: &str,
        params: Value,
        signers: Value,
    ) -> ChainResult<InvokeResult> {
        self.call(
            "invokefunction",
            json!([script_hash, operation, params, signers]),
        )
        .await
    }

    /// Simulates a raw script, used the same way as `invoke_function` but for
    /// hand-assembled scripts (e.g. the batched `updatePriceBatch` call).
    pub async fn invoke_script(&self, script_base64: &str, signers: Value) -> ChainResult<InvokeResult> {
        self.call("invokescript", json!([script_base64, signers])).await
    }

    /// Broadcasts a fully-signed transaction. Returns the transaction hash.
    pub async fn send_raw_transaction(&self, tx_base64: &str) -> ChainResult<Value> {
        self.call("sendrawtransaction", json!([tx_base64])).await
    }

    /// Fetches a transaction by hash with verbosity, used to poll confirmation.
    /// Returns `None` if the node has not seen the transaction (mempool miss or
    /// not yet relayed), which the caller treats as still-pending rather than
    /// permanently failed until its deadline elapses.
    pub async fn get_raw_transaction(&self, tx_hash: &str) -> ChainResult<Option<Value>> {
        match self
            .call::<Value>("getrawtransaction", json!([tx_hash, true]))
            .await
        {
            Ok(v) => Ok(Some(v)),
            Err(ChainError::RpcError { code, .. }) if code == -100 || code == -2146233086 => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// NEP-17 balances for an address, used by the asset sweep to decide
    /// whether the TEE account holds more than its operating reserve.
    pub async fn get_nep17_balances(&self, address: &str) -> ChainResult<Nep17BalancesResult> {
        self.call("getnep17balances", json!([address])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_localhost() {
        let config = RpcClientConfig::default();
        assert!(config.endpoint.contains("10332"));
    }
}
