//! secp256r1 signing helpers for transaction witnesses and attestation records.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::ecdsa::signature::Verifier;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::KeyPair;

/// Signs a Neo transaction hash for inclusion in a witness's invocation script.
///
/// Neo signs `SHA256(tx_data || network_magic_le_u32)`, not the raw transaction
/// hash, so the caller is responsible for appending the network magic before the
/// hash is taken; this function signs whatever 32-byte digest it is given.
pub fn sign_digest(key: &KeyPair, digest: &[u8; 32]) -> CryptoResult<[u8; 64]> {
    let signature: Signature = key
        .signing_key()
        .try_sign(digest)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
    let mut out = [0u8; 64];
    out.copy_from_slice(&signature.to_bytes());
    Ok(out)
}

/// Computes the signing digest for a transaction: `SHA256(tx_bytes || magic_le)`.
pub fn transaction_signing_digest(tx_bytes: &[u8], network_magic: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tx_bytes);
    hasher.update(network_magic.to_le_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Verifies a raw 64-byte (r || s) signature against a digest and public key.
pub fn verify_digest(
    verifying_key: &VerifyingKey,
    digest: &[u8; 32],
    signature_bytes: &[u8; 64],
) -> CryptoResult<()> {
    let signature =
        Signature::from_slice(signature_bytes).map_err(|_| CryptoError::VerificationFailed)?;
    verifying_key
        .verify(digest, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Deterministic attestation signature: lowercase hex SHA-256 over the
/// canonical JSON payload, the run's commit SHA, and the actor, joined by `|`.
///
/// This is not an asymmetric signature — it binds an attestation record to the
/// exact build and actor that produced it, without requiring key material to
/// verify. Any party can recompute it from the three inputs.
pub fn attestation_signature(canonical_json: &str, run_commit_sha: &str, run_actor: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json.as_bytes());
    hasher.update(b"|");
    hasher.update(run_commit_sha.as_bytes());
    hasher.update(b"|");
    hasher.update(run_actor.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let key = KeyPair::generate().unwrap();
        let digest = transaction_signing_digest(b"deadbeef", 860833102);
        let sig = sign_digest(&key, &digest).unwrap();
        verify_digest(&key.verifying_key(), &digest, &sig).unwrap();
    }

    #[test]
    fn verify_rejects_wrong_digest() {
        let key = KeyPair::generate().unwrap();
        let digest = transaction_signing_digest(b"deadbeef", 860833102);
        let sig = sign_digest(&key, &digest).unwrap();
        let other_digest = transaction_signing_digest(b"not-deadbeef", 860833102);
        assert!(verify_digest(&key.verifying_key(), &other_digest, &sig).is_err());
    }

    #[test]
    fn attestation_signature_is_deterministic() {
        let a = attestation_signature("{\"a\":1}", "abc123", "scheduler");
        let b = attestation_signature("{\"a\":1}", "abc123", "scheduler");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn attestation_signature_changes_with_actor() {
        let a = attestation_signature("{\"a\":1}", "abc123", "scheduler");
        let b = attestation_signature("{\"a\":1}", "abc123", "operator");
        assert_ne!(a, b);
    }
}
