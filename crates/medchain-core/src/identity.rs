//! Actors of the ledger: addresses, patients and doctors.
//!
//! Entities are owned by the registry and referenced everywhere else by
//! `Address`. State changes go through `pub(crate)` mutators that only the
//! registry projection calls.

use crate::chain::{Chain, VerificationReport};
use crate::record::{EntityRecord, EntityRole};
use medchain_crypto::{sha256_hex, AccessKeyPair, AccessPublicKey, AccessSecretKey, AuthorizationToken};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex SHA-256 of an entity name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn from_name(name: &str) -> Self {
        Self(sha256_hex(name.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

#[derive(Debug)]
pub struct Patient {
    name: String,
    address: Address,
    illness_history: Vec<String>,
    prescriptions: Vec<String>,
    permanent_keys: AccessKeyPair,
    temporary_keys: AccessKeyPair,
    chain: Chain<EntityRecord>,
}

impl Patient {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_permanent_keys(name, AccessKeyPair::generate())
    }

    /// Register a patient whose permanent key pair was issued elsewhere.
    pub fn with_permanent_keys(name: impl Into<String>, permanent_keys: AccessKeyPair) -> Self {
        let name = name.into();
        let address = Address::from_name(&name);
        let chain = Chain::new(name.clone(), EntityRecord::genesis(&name, EntityRole::Patient));
        Self {
            name,
            address,
            illness_history: Vec::new(),
            prescriptions: Vec::new(),
            permanent_keys,
            temporary_keys: AccessKeyPair::generate(),
            chain,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn illness_history(&self) -> &[String] {
        &self.illness_history
    }

    pub fn prescriptions(&self) -> &[String] {
        &self.prescriptions
    }

    pub fn permanent_public_key(&self) -> AccessPublicKey {
        self.permanent_keys.public()
    }

    pub fn temporary_public_key(&self) -> AccessPublicKey {
        self.temporary_keys.public()
    }

    /// Owner-side handle on the permanent secret key.
    pub fn permanent_key(&self) -> &AccessSecretKey {
        self.permanent_keys.secret()
    }

    /// Owner-side handle on the current temporary secret key. It stops
    /// working after the next gated read.
    pub fn temporary_key(&self) -> &AccessSecretKey {
        self.temporary_keys.secret()
    }

    /// Integrity report for the patient chain. Contents stay behind the gate.
    pub fn verify_chain(&self) -> VerificationReport {
        self.chain.verify()
    }

    pub fn chain_size(&self) -> usize {
        self.chain.size()
    }

    pub(crate) fn chain(&self) -> &Chain<EntityRecord> {
        &self.chain
    }

    pub(crate) fn chain_mut(&mut self) -> &mut Chain<EntityRecord> {
        &mut self.chain
    }

    pub(crate) fn record_illness(&mut self, illness: &str) {
        self.illness_history.push(illness.to_string());
    }

    pub(crate) fn record_prescription(&mut self, prescription: &str) {
        self.prescriptions.push(prescription.to_string());
    }

    pub(crate) fn rotate_temporary_keys(&mut self) {
        self.temporary_keys = AccessKeyPair::generate();
        log::debug!("rotated temporary access key for patient {}", self.address.short());
    }
}

#[derive(Debug)]
pub struct Doctor {
    name: String,
    address: Address,
    authorization: Option<AuthorizationToken>,
    chain: Chain<EntityRecord>,
}

impl Doctor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let address = Address::from_name(&name);
        let chain = Chain::new(name.clone(), EntityRecord::genesis(&name, EntityRole::Doctor));
        Self {
            name,
            address,
            authorization: None,
            chain,
        }
    }

    /// Register a doctor that already presents a credential. The credential
    /// is checked by the validator on every transaction, never here.
    pub fn with_authorization(name: impl Into<String>, token: AuthorizationToken) -> Self {
        let mut doctor = Self::new(name);
        doctor.authorization = Some(token);
        doctor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn authorization(&self) -> Option<&AuthorizationToken> {
        self.authorization.as_ref()
    }

    pub fn chain(&self) -> &Chain<EntityRecord> {
        &self.chain
    }

    pub(crate) fn chain_mut(&mut self) -> &mut Chain<EntityRecord> {
        &mut self.chain
    }

    pub(crate) fn install_authorization(&mut self, token: AuthorizationToken) {
        self.authorization = Some(token);
    }
}
