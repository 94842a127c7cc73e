//! The central health authority: issues doctor authorizations and owns the
//! prescription/illness incompatibility table.

use crate::identity::Address;
use medchain_crypto::{AuthorityKeyPair, AuthorityVerifyKey, AuthorizationToken, CryptoResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_AUTHORITY_NAME: &str = "Minister of Health";

/// Prescription label -> illness labels it must never be combined with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompatibilityTable(BTreeMap<String, BTreeSet<String>>);

impl IncompatibilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the entry for `prescription`; existing illnesses are kept.
    pub fn insert<I, S>(&mut self, prescription: &str, illnesses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(prescription.to_string())
            .or_default()
            .extend(illnesses.into_iter().map(Into::into));
    }

    pub fn incompatible_with(&self, prescription: &str) -> Option<&BTreeSet<String>> {
        self.0.get(prescription)
    }

    /// Illnesses in `history` that rule out `prescription`, in history order
    /// without duplicates.
    pub fn conflicts(&self, prescription: &str, history: &[String]) -> Vec<String> {
        let Some(incompatible) = self.0.get(prescription) else {
            return Vec::new();
        };
        let mut found: Vec<String> = Vec::new();
        for illness in history {
            if incompatible.contains(illness) && !found.contains(illness) {
                found.push(illness.clone());
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug)]
pub struct Authority {
    name: String,
    address: Address,
    keys: AuthorityKeyPair,
    incompatibilities: IncompatibilityTable,
}

impl Authority {
    pub fn new() -> Self {
        Self::with_keys(DEFAULT_AUTHORITY_NAME, AuthorityKeyPair::generate())
    }

    pub fn with_keys(name: impl Into<String>, keys: AuthorityKeyPair) -> Self {
        let name = name.into();
        let address = Address::from_name(&name);
        Self {
            name,
            address,
            keys,
            incompatibilities: IncompatibilityTable::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn verify_key(&self) -> AuthorityVerifyKey {
        self.keys.verify_key()
    }

    /// Sign the doctor's address bytes.
    pub fn authorize(&self, doctor: &Address) -> AuthorizationToken {
        log::info!("authority {} signing authorization for {}", self.name, doctor.short());
        self.keys.sign(doctor.as_bytes())
    }

    /// Check that `token` is this authority's signature over `doctor`.
    pub fn verify_authorization(&self, doctor: &Address, token: &AuthorizationToken) -> CryptoResult<()> {
        self.keys.verify_key().verify(doctor.as_bytes(), token)
    }

    pub fn incompatibilities(&self) -> &IncompatibilityTable {
        &self.incompatibilities
    }

    pub fn add_incompatibilities<I, S>(&mut self, prescription: &str, illnesses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.incompatibilities.insert(prescription, illnesses);
    }
}

impl Default for Authority {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_address_is_minister() {
        let authority = Authority::new();
        assert_eq!(authority.address(), &Address::from_name("Minister of Health"));
    }

    #[test]
    fn test_authorization_binds_doctor_address() {
        let authority = Authority::new();
        let green = Address::from_name("Dr. Green");
        let blue = Address::from_name("Dr. Blue");
        let token = authority.authorize(&green);

        assert!(authority.verify_authorization(&green, &token).is_ok());
        assert!(authority.verify_authorization(&blue, &token).is_err());
    }

    #[test]
    fn test_conflicts_follow_history_order() {
        let mut table = IncompatibilityTable::new();
        table.insert("medicine1", ["illness1", "illness3"]);
        table.insert("medicine1", ["illness2"]);

        let history = vec![
            "illness3".to_string(),
            "illness4".to_string(),
            "illness1".to_string(),
            "illness3".to_string(),
        ];
        assert_eq!(table.conflicts("medicine1", &history), vec!["illness3", "illness1"]);
        assert!(table.conflicts("medicine2", &history).is_empty());
        assert_eq!(table.incompatible_with("medicine1").map(|s| s.len()), Some(3));
    }
}
