//! Neo N3 JSON-RPC client, dual-signed transaction assembly, and confirmation
//! polling for the TEE price-feed oracle's batch submitter.

pub mod error;
pub mod rpc;
pub mod transaction;
pub mod types;

pub use error::{ChainError, ChainResult};
pub use rpc::{RpcClient, RpcClientConfig};
pub use transaction::{
    build_transfer_script, build_update_price_batch_script, signers_json, SignedTransaction,
    TransactionSigner, UnsignedTransaction, Witness, SCOPE_CALLED_BY_ENTRY,
};
pub use types::{InvokeResult, Nep17Balance, Nep17BalancesResult, TxConfirmation};
