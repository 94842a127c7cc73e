//! Patient access keys: a secret key is presented at read time, the gate derives
//! its public half and compares it to the keys on record.

use crate::{CryptoError, CryptoResult};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Secret half of an access key pair.
#[derive(Clone)]
pub struct AccessSecretKey(SigningKey);

impl AccessSecretKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(bytes))
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> AccessPublicKey {
        AccessPublicKey(self.0.verifying_key().to_bytes())
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl fmt::Debug for AccessSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessSecretKey(<redacted>)")
    }
}

/// Public half of an access key pair, compared byte-wise by the gate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessPublicKey([u8; 32]);

impl AccessPublicKey {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyFormat(format!(
                "access public key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AccessPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessPublicKey({})", self.to_hex())
    }
}

#[derive(Clone, Debug)]
pub struct AccessKeyPair {
    secret: AccessSecretKey,
    public: AccessPublicKey,
}

impl AccessKeyPair {
    pub fn generate() -> Self {
        let secret = AccessSecretKey(SigningKey::generate(&mut OsRng));
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn from_secret(secret: AccessSecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn secret(&self) -> &AccessSecretKey {
        &self.secret
    }

    pub fn public(&self) -> AccessPublicKey {
        self.public
    }
}
