//! secp256r1 key management, signing, and Neo N3 address derivation for the
//! TEE price-feed oracle. Kept as its own crate so the signing surface can be
//! audited and tested independently of the oracle's HTTP and RPC concerns.

pub mod error;
pub mod keys;
pub mod signing;

pub use error::{CryptoError, CryptoResult};
pub use keys::{decode_address, encode_address, KeyPair, NEO_ADDRESS_VERSION};
pub use signing::{attestation_signature, sign_digest, transaction_signing_digest, verify_digest};
