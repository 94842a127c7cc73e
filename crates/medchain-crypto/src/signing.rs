//! Authority signatures
//!
//! The Authority ("Minister of Health") signs a doctor's address to certify that
//! the doctor may act on patients. Signatures are Ed25519 and detached: the token
//! carries only the 64 signature bytes, the signed message is always the address.

use crate::{CryptoError, CryptoResult};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Signing side of the Authority. Never leaves the Authority record.
pub struct AuthorityKeyPair {
    signing_key: SigningKey,
}

impl AuthorityKeyPair {
    /// Generate a fresh key pair from the OS random source.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a key pair from a 32-byte secret seed.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn verify_key(&self) -> AuthorityVerifyKey {
        AuthorityVerifyKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign an arbitrary message, producing a detached authorization token.
    pub fn sign(&self, message: &[u8]) -> AuthorizationToken {
        let signature: Signature = self.signing_key.sign(message);
        AuthorizationToken(signature.to_bytes().to_vec())
    }
}

impl fmt::Debug for AuthorityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityKeyPair")
            .field("verify_key", &self.verify_key())
            .finish_non_exhaustive()
    }
}

/// Public verify key of the Authority.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorityVerifyKey([u8; 32]);

impl AuthorityVerifyKey {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyFormat(format!(
                "verify key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify `token` over `message`. Uses strict verification so malleable
    /// signatures are rejected.
    pub fn verify(&self, message: &[u8], token: &AuthorizationToken) -> CryptoResult<()> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        let signature = Signature::from_slice(token.as_bytes())
            .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;
        key.verify_strict(message, &signature).map_err(|e| {
            log::debug!("authorization token rejected under {}: {}", self.to_hex(), e);
            CryptoError::SignatureVerificationFailed(e.to_string())
        })
    }
}

impl fmt::Debug for AuthorityVerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorityVerifyKey({})", self.to_hex())
    }
}

/// Detached Ed25519 signature issued by the Authority.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationToken(Vec<u8>);

impl AuthorizationToken {
    pub fn from_bytes(bytes: Vec<u8>) -> CryptoResult<Self> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(CryptoError::InvalidSignatureFormat(format!(
                "authorization token must be {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "AuthorizationToken({}..)", &hex[..hex.len().min(16)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_verifies_under_issuer_key() {
        let authority = AuthorityKeyPair::generate();
        let token = authority.sign(b"doctor-address");

        assert!(authority.verify_key().verify(b"doctor-address", &token).is_ok());
    }

    #[test]
    fn test_token_fails_on_wrong_message() {
        let authority = AuthorityKeyPair::generate();
        let token = authority.sign(b"doctor-address");

        let result = authority.verify_key().verify(b"other-address", &token);
        assert!(matches!(result, Err(CryptoError::SignatureVerificationFailed(_))));
    }

    #[test]
    fn test_forged_token_fails_under_authority_key() {
        let authority = AuthorityKeyPair::generate();
        let impostor = AuthorityKeyPair::generate();
        let forged = impostor.sign(b"doctor-address");

        assert!(authority.verify_key().verify(b"doctor-address", &forged).is_err());
    }

    #[test]
    fn test_token_length_is_checked() {
        assert!(AuthorizationToken::from_bytes(vec![0u8; 12]).is_err());
        assert!(AuthorizationToken::from_bytes(vec![0u8; SIGNATURE_LEN]).is_ok());
    }

    #[test]
    fn test_key_pair_from_seed_is_stable() {
        let a = AuthorityKeyPair::from_secret_bytes(&[7u8; 32]);
        let b = AuthorityKeyPair::from_secret_bytes(&[7u8; 32]);
        assert_eq!(a.verify_key(), b.verify_key());

        let parsed = AuthorityVerifyKey::from_bytes(a.verify_key().as_bytes()).unwrap();
        assert_eq!(parsed, a.verify_key());
    }
}
