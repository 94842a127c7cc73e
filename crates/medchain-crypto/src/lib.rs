//! Cryptographic primitives for the Medchain ledger.
//!
//! - `hashing`: SHA-256 digests used for block linking, addresses and proofs of work.
//! - `signing`: the Authority's Ed25519 key pair and the authorization tokens it issues.
//! - `access_keys`: patient access key pairs consumed by the access gate.

pub mod access_keys;
pub mod hashing;
pub mod signing;

pub use access_keys::{AccessKeyPair, AccessPublicKey, AccessSecretKey};
pub use hashing::{sha256, sha256_hex, HASH_HEX_LEN, ZERO_HASH_HEX};
pub use signing::{AuthorityKeyPair, AuthorityVerifyKey, AuthorizationToken};

use thiserror::Error;

/// Error type for cryptographic operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Invalid key format
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Invalid signature format
    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
