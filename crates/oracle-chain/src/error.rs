//! Error types for Neo N3 RPC communication and transaction construction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc transport error calling {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rpc error calling {method}: {code} {message}")]
    RpcError {
        method: String,
        code: i64,
        message: String,
    },

    #[error("unexpected rpc response shape from {method}: {detail}")]
    MalformedResponse { method: String, detail: String },

    #[error("transaction construction failed: {0}")]
    ConstructionFailed(String),

    #[error("signing error: {0}")]
    Signing(#[from] oracle_crypto::CryptoError),

    #[error("confirmation timed out after {0:?} waiting for tx {1}")]
    ConfirmationTimeout(std::time::Duration, String),

    #[error("asset sweep failed: {0}")]
    SweepFailed(String),
}

pub type ChainResult<T> = Result<T, ChainError>;
