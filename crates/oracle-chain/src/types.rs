//! Wire types for the Neo N3 JSON-RPC 2.0 surface this crate uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: u64,
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Result of `invokefunction` / `invokescript` — a script simulation, not a
/// committed transaction. `gasconsumed` guides the `system_fee` we set.
#[derive(Debug, Deserialize)]
pub struct InvokeResult {
    pub state: String,
    pub gasconsumed: String,
    pub script: String,
    #[serde(default)]
    pub exception: Option<String>,
}

/// A single NEP-17 balance entry from `getnep17balances`.
#[derive(Debug, Deserialize)]
pub struct Nep17Balance {
    #[serde(rename = "assethash")]
    pub asset_hash: String,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct Nep17BalancesResult {
    pub balance: Vec<Nep17Balance>,
}

/// Confirmation status of a submitted transaction, mirrored from
/// `getrawtransaction`'s presence/absence of a `confirmations` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxConfirmation {
    Unconfirmed,
    Confirmed { block_index: u64 },
    NotFound,
}
