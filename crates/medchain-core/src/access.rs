//! Gated reads of patient data.
//!
//! A caller presents a secret key; the gate derives its public half and
//! compares it to the patient's current temporary and permanent public keys.
//! Every successful read rotates the temporary key pair, so a temporary key
//! works exactly once.

use crate::block::Block;
use crate::chain::Chain;
use crate::identity::{Address, Patient};
use crate::record::EntityRecord;
use crate::registry::EntityRegistry;
use medchain_crypto::AccessSecretKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("a key is needed to read patient data")]
    MissingKey,

    #[error("access denied for patient {patient}")]
    AccessDenied { patient: String },

    #[error("unknown patient {0}")]
    UnknownPatient(String),
}

/// Snapshot of a patient's medical history returned by a gated read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientHistory {
    pub name: String,
    pub address: Address,
    pub illnesses: Vec<String>,
    pub prescriptions: Vec<String>,
}

pub struct AccessGate;

impl AccessGate {
    pub fn authorize(patient: &Patient, presented: Option<&AccessSecretKey>) -> Result<(), AccessError> {
        let key = presented.ok_or(AccessError::MissingKey)?;
        let public = key.public_key();
        if public == patient.temporary_public_key() || public == patient.permanent_public_key() {
            Ok(())
        } else {
            log::warn!("access denied for patient {}", patient.address().short());
            Err(AccessError::AccessDenied {
                patient: patient.address().to_string(),
            })
        }
    }

    /// Authorize, run `read`, then rotate the temporary key pair.
    pub fn read<T>(
        patient: &mut Patient,
        presented: Option<&AccessSecretKey>,
        read: impl FnOnce(&Patient) -> T,
    ) -> Result<T, AccessError> {
        Self::authorize(patient, presented)?;
        let out = read(patient);
        patient.rotate_temporary_keys();
        log::info!("gated read of patient {} served", patient.address().short());
        Ok(out)
    }
}

impl EntityRegistry {
    fn gated<T>(
        &mut self,
        patient: &Address,
        presented: Option<&AccessSecretKey>,
        read: impl FnOnce(&Patient) -> T,
    ) -> Result<T, AccessError> {
        let patient = self
            .patient_mut(patient)
            .ok_or_else(|| AccessError::UnknownPatient(patient.to_string()))?;
        AccessGate::read(patient, presented, read)
    }

    pub fn read_history(
        &mut self,
        patient: &Address,
        presented: Option<&AccessSecretKey>,
    ) -> Result<PatientHistory, AccessError> {
        self.gated(patient, presented, |p| PatientHistory {
            name: p.name().to_string(),
            address: p.address().clone(),
            illnesses: p.illness_history().to_vec(),
            prescriptions: p.prescriptions().to_vec(),
        })
    }

    pub fn read_patient_chain(
        &mut self,
        patient: &Address,
        presented: Option<&AccessSecretKey>,
    ) -> Result<Chain<EntityRecord>, AccessError> {
        self.gated(patient, presented, |p| p.chain().clone())
    }

    /// Block `n` of the patient chain; `Ok(None)` when out of range (the read
    /// still counts and rotates the key).
    pub fn read_patient_block(
        &mut self,
        patient: &Address,
        n: usize,
        presented: Option<&AccessSecretKey>,
    ) -> Result<Option<Block<EntityRecord>>, AccessError> {
        self.gated(patient, presented, |p| p.chain().get_block(n).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::Authority;
    use medchain_crypto::AccessKeyPair;

    fn registry_with_patient() -> (EntityRegistry, Address) {
        let mut registry = EntityRegistry::new(Authority::new());
        let address = registry.register_patient(Patient::new("Mr. Black")).unwrap();
        (registry, address)
    }

    #[test]
    fn test_missing_key() {
        let (mut registry, address) = registry_with_patient();
        assert_eq!(registry.read_history(&address, None), Err(AccessError::MissingKey));
    }

    #[test]
    fn test_temporary_key_works_once() {
        let (mut registry, address) = registry_with_patient();
        let key = registry.patient(&address).unwrap().temporary_key().clone();

        let history = registry.read_history(&address, Some(&key)).unwrap();
        assert_eq!(history.name, "Mr. Black");
        assert!(history.illnesses.is_empty());

        assert!(matches!(
            registry.read_history(&address, Some(&key)),
            Err(AccessError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_permanent_key_survives_rotation() {
        let (mut registry, address) = registry_with_patient();
        let key = registry.patient(&address).unwrap().permanent_key().clone();

        for _ in 0..3 {
            assert!(registry.read_history(&address, Some(&key)).is_ok());
        }
    }

    #[test]
    fn test_fresh_temporary_key_after_rotation() {
        let (mut registry, address) = registry_with_patient();
        let first = registry.patient(&address).unwrap().temporary_key().clone();
        registry.read_patient_chain(&address, Some(&first)).unwrap();

        let second = registry.patient(&address).unwrap().temporary_key().clone();
        let block = registry.read_patient_block(&address, 0, Some(&second)).unwrap();
        assert_eq!(block.map(|b| b.index()), Some(0));
    }

    #[test]
    fn test_stranger_key_is_denied() {
        let (mut registry, address) = registry_with_patient();
        let stranger = AccessKeyPair::generate();
        assert!(matches!(
            registry.read_history(&address, Some(stranger.secret())),
            Err(AccessError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_unknown_patient() {
        let (mut registry, _) = registry_with_patient();
        let key = AccessKeyPair::generate();
        assert!(matches!(
            registry.read_history(&Address::from_name("Nobody"), Some(key.secret())),
            Err(AccessError::UnknownPatient(_))
        ));
    }
}
