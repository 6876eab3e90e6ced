//! Top-level error taxonomy for the oracle binary, matching the exit-code
//! contract described in the operator-facing CLI documentation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("upstream error from {source_name}: {message}")]
    Upstream {
        source_name: String,
        message: String,
        transient: bool,
    },

    #[error("no data collected for symbol {0}")]
    NoDataCollected(String),

    #[error("aggregation input was empty for symbol {0}")]
    AggregationEmpty(String),

    #[error("price for {symbol} overflowed the on-chain integer range: {raw}")]
    ScalingOverflow { symbol: String, raw: String },

    #[error("signing error: {0}")]
    Signing(#[from] oracle_crypto::CryptoError),

    #[error("submission error: {0}")]
    Submission(#[from] oracle_chain::ChainError),

    #[error("confirmation timed out for batch {0}")]
    ConfirmationTimeout(String),

    #[error("attestation error: {0}")]
    Attestation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OracleError {
    /// Process exit code for this error, per the CLI's 0/1 contract. Every
    /// error path currently maps to 1; this indirection exists so a future
    /// distinction (e.g. retryable vs. fatal) doesn't require touching every
    /// call site.
    pub fn exit_code(&self) -> i32 {
        1
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Upstream { transient: true, .. })
    }
}

pub type OracleResult<T> = Result<T, OracleError>;
