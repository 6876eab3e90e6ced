//! Error types for signing and attestation operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid address encoding: {0}")]
    InvalidAddress(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
