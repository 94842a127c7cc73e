//! Authoritative store of every entity, keyed by kind.
//!
//! All entity state changes caused by the ledger go through
//! `EntityRegistry::project`, which the consensus engine calls while sealing.

use crate::authority::Authority;
use crate::chain::{Chain, ChainError, VerificationReport};
use crate::identity::{Address, Doctor, Patient};
use crate::record::{EntityRecord, EntityRole};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("patient {0} already registered")]
    DuplicatePatient(String),

    #[error("doctor {0} already registered")]
    DuplicateDoctor(String),

    #[error("medical event {0} already registered")]
    DuplicateEvent(String),

    #[error("no entity chain named {0}")]
    UnknownChain(String),

    #[error("{label} is registered as a {registered}, not a {requested}")]
    EventKindMismatch {
        label: String,
        registered: EventKind,
        requested: EventKind,
    },

    #[error("entity chain {owner} rejected a record: {source}")]
    Chain {
        owner: String,
        #[source]
        source: ChainError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Disease,
    Prescription,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Disease => f.write_str("disease"),
            EventKind::Prescription => f.write_str("prescription"),
        }
    }
}

/// A disease or prescription label with its own chain of occurrences.
#[derive(Debug)]
pub struct MedicalEvent {
    kind: EventKind,
    name: String,
    incompatibilities: Vec<String>,
    chain: Chain<EntityRecord>,
}

impl MedicalEvent {
    fn new(kind: EventKind, name: &str, incompatibilities: Vec<String>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            incompatibilities,
            chain: Chain::new(name, EntityRecord::genesis(name, EntityRole::Event)),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Illnesses this prescription must not be combined with; empty for diseases.
    pub fn incompatibilities(&self) -> &[String] {
        &self.incompatibilities
    }

    pub fn chain(&self) -> &Chain<EntityRecord> {
        &self.chain
    }
}

#[derive(Debug)]
pub struct EntityRegistry {
    authority: Authority,
    patients: BTreeMap<Address, Patient>,
    doctors: BTreeMap<Address, Doctor>,
    events: BTreeMap<String, MedicalEvent>,
}

impl EntityRegistry {
    pub fn new(authority: Authority) -> Self {
        Self {
            authority,
            patients: BTreeMap::new(),
            doctors: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn register_patient(&mut self, patient: Patient) -> Result<Address, RegistryError> {
        let address = patient.address().clone();
        if self.patients.contains_key(&address) {
            return Err(RegistryError::DuplicatePatient(patient.name().to_string()));
        }
        log::info!("registered patient {} ({})", patient.name(), address.short());
        self.patients.insert(address.clone(), patient);
        Ok(address)
    }

    pub fn register_doctor(&mut self, doctor: Doctor) -> Result<Address, RegistryError> {
        let address = doctor.address().clone();
        if self.doctors.contains_key(&address) {
            return Err(RegistryError::DuplicateDoctor(doctor.name().to_string()));
        }
        log::info!("registered doctor {} ({})", doctor.name(), address.short());
        self.doctors.insert(address.clone(), doctor);
        Ok(address)
    }

    pub fn register_disease(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.events.contains_key(name) {
            return Err(RegistryError::DuplicateEvent(name.to_string()));
        }
        self.events
            .insert(name.to_string(), MedicalEvent::new(EventKind::Disease, name, Vec::new()));
        Ok(())
    }

    /// Register a prescription and extend the authority's incompatibility
    /// table with `incompatible_illnesses`. Labels need not be registered.
    pub fn register_prescription<I, S>(&mut self, name: &str, incompatible_illnesses: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.events.contains_key(name) {
            return Err(RegistryError::DuplicateEvent(name.to_string()));
        }
        let illnesses: Vec<String> = incompatible_illnesses.into_iter().map(Into::into).collect();
        self.authority.add_incompatibilities(name, illnesses.iter().cloned());
        log::info!("registered prescription {} incompatible with {:?}", name, illnesses);
        self.events.insert(
            name.to_string(),
            MedicalEvent::new(EventKind::Prescription, name, illnesses),
        );
        Ok(())
    }

    pub fn patient(&self, address: &Address) -> Option<&Patient> {
        self.patients.get(address)
    }

    pub(crate) fn patient_mut(&mut self, address: &Address) -> Option<&mut Patient> {
        self.patients.get_mut(address)
    }

    pub fn patient_by_name(&self, name: &str) -> Option<&Patient> {
        self.patients.get(&Address::from_name(name))
    }

    pub fn doctor(&self, address: &Address) -> Option<&Doctor> {
        self.doctors.get(address)
    }

    pub fn doctor_by_name(&self, name: &str) -> Option<&Doctor> {
        self.doctors.get(&Address::from_name(name))
    }

    pub fn event(&self, name: &str) -> Option<&MedicalEvent> {
        self.events.get(name)
    }

    /// Kind `label` is registered under, if any.
    pub fn event_kind(&self, label: &str) -> Option<EventKind> {
        self.events.get(label).map(MedicalEvent::kind)
    }

    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    pub fn doctors(&self) -> impl Iterator<Item = &Doctor> {
        self.doctors.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &MedicalEvent> {
        self.events.values()
    }

    /// Verify the entity chain owned by `name`: a patient, doctor or event.
    pub fn verify_entity_chain(&self, name: &str) -> Result<VerificationReport, RegistryError> {
        let address = Address::from_name(name);
        if let Some(patient) = self.patients.get(&address) {
            return Ok(patient.verify_chain());
        }
        if let Some(doctor) = self.doctors.get(&address) {
            return Ok(doctor.chain().verify());
        }
        if let Some(event) = self.events.get(name) {
            return Ok(event.chain().verify());
        }
        Err(RegistryError::UnknownChain(name.to_string()))
    }

    /// Apply one sealed transaction to entity state. Only the consensus
    /// engine calls this, after the transaction's block is on the ledger.
    ///
    /// Every entity chain the transaction touches gets an append attempt; the
    /// first failure is returned. Patient and doctor state only change when
    /// their own chain took the record.
    pub fn project(&mut self, transaction: &Transaction, ledger_index: u64) -> Result<(), RegistryError> {
        match transaction {
            Transaction::Authorization {
                sender,
                recipient,
                signature,
                ..
            } => {
                let Some(doctor) = self.doctors.get_mut(recipient) else {
                    log::warn!("sealed authorization for unknown doctor {}", recipient.short());
                    return Ok(());
                };
                let record = EntityRecord::Authorization {
                    doctor: recipient.clone(),
                    authority: sender.clone(),
                    ledger_index,
                };
                append_record(doctor.chain_mut(), record)?;
                doctor.install_authorization(signature.clone());
                Ok(())
            }
            Transaction::Diagnosis {
                sender,
                recipient,
                illness,
                ..
            } => {
                let record = EntityRecord::Diagnosis {
                    illness: illness.clone(),
                    patient: recipient.clone(),
                    doctor: sender.clone(),
                    ledger_index,
                };
                self.fan_out(EventKind::Disease, illness, sender, recipient, record)
            }
            Transaction::Prescription {
                sender,
                recipient,
                prescription,
                ..
            } => {
                let record = EntityRecord::Prescription {
                    prescription: prescription.clone(),
                    patient: recipient.clone(),
                    doctor: sender.clone(),
                    ledger_index,
                };
                self.fan_out(EventKind::Prescription, prescription, sender, recipient, record)
            }
        }
    }

    /// Append `record` to the patient, doctor and event chains. Events seen
    /// for the first time are registered on the fly; a label registered
    /// under the other kind is refused before anything changes.
    fn fan_out(
        &mut self,
        kind: EventKind,
        label: &str,
        doctor: &Address,
        patient: &Address,
        record: EntityRecord,
    ) -> Result<(), RegistryError> {
        if let Some(registered) = self.event_kind(label).filter(|registered| *registered != kind) {
            return Err(RegistryError::EventKindMismatch {
                label: label.to_string(),
                registered,
                requested: kind,
            });
        }

        let mut failures = Vec::new();
        if let Some(patient) = self.patients.get_mut(patient) {
            match append_record(patient.chain_mut(), record.clone()) {
                Ok(()) => match kind {
                    EventKind::Disease => patient.record_illness(label),
                    EventKind::Prescription => patient.record_prescription(label),
                },
                Err(e) => failures.push(e),
            }
        }
        if let Some(doctor) = self.doctors.get_mut(doctor) {
            if let Err(e) = append_record(doctor.chain_mut(), record.clone()) {
                failures.push(e);
            }
        }
        let event = self.events.entry(label.to_string()).or_insert_with(|| {
            log::debug!("registering {} {} on first use", kind, label);
            MedicalEvent::new(kind, label, Vec::new())
        });
        if let Err(e) = append_record(&mut event.chain, record) {
            failures.push(e);
        }

        for failure in failures.iter().skip(1) {
            log::warn!("projection of {} also failed: {}", label, failure);
        }
        match failures.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

fn append_record(chain: &mut Chain<EntityRecord>, record: EntityRecord) -> Result<(), RegistryError> {
    let appended = chain.append(record).map(|_| ());
    appended.map_err(|source| RegistryError::Chain {
        owner: chain.owner().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EntityRegistry {
        let mut registry = EntityRegistry::new(Authority::new());
        registry.register_patient(Patient::new("Mr. Black")).unwrap();
        registry.register_doctor(Doctor::new("Dr. Green")).unwrap();
        registry.register_disease("illness1").unwrap();
        registry.register_prescription("medicine1", ["illness1"]).unwrap();
        registry
    }

    #[test]
    fn test_duplicates_are_refused() {
        let mut registry = registry();
        assert!(matches!(
            registry.register_patient(Patient::new("Mr. Black")),
            Err(RegistryError::DuplicatePatient(_))
        ));
        assert!(matches!(
            registry.register_doctor(Doctor::new("Dr. Green")),
            Err(RegistryError::DuplicateDoctor(_))
        ));
        assert!(matches!(
            registry.register_disease("medicine1"),
            Err(RegistryError::DuplicateEvent(_))
        ));
    }

    #[test]
    fn test_prescription_extends_authority_table() {
        let registry = registry();
        let history = vec!["illness1".to_string()];
        assert_eq!(
            registry.authority().incompatibilities().conflicts("medicine1", &history),
            vec!["illness1"]
        );
        assert_eq!(registry.event("medicine1").map(|e| e.kind()), Some(EventKind::Prescription));
    }

    #[test]
    fn test_diagnosis_projects_onto_three_chains() {
        let mut registry = registry();
        let patient = Address::from_name("Mr. Black");
        let doctor = Address::from_name("Dr. Green");
        let tx = Transaction::Diagnosis {
            sender: doctor.clone(),
            recipient: patient.clone(),
            illness: "illness1".into(),
            fee: 0.2,
        };

        registry.project(&tx, 1).unwrap();

        let black = registry.patient(&patient).unwrap();
        assert_eq!(black.illness_history(), ["illness1"]);
        assert_eq!(black.chain_size(), 1);
        assert_eq!(registry.doctor(&doctor).unwrap().chain().size(), 1);
        assert_eq!(registry.event("illness1").unwrap().chain().size(), 1);
        assert!(registry.verify_entity_chain("Mr. Black").unwrap().is_valid());
    }

    #[test]
    fn test_authorization_installs_token() {
        let mut registry = registry();
        let doctor = Address::from_name("Dr. Green");
        let token = registry.authority().authorize(&doctor);
        let tx = Transaction::Authorization {
            sender: registry.authority().address().clone(),
            recipient: doctor.clone(),
            signature: token.clone(),
            fee: 0.5,
        };

        registry.project(&tx, 1).unwrap();

        let green = registry.doctor(&doctor).unwrap();
        assert_eq!(green.authorization(), Some(&token));
        assert_eq!(green.chain().size(), 1);
    }

    #[test]
    fn test_unknown_event_label_is_registered_on_first_use() {
        let mut registry = registry();
        let tx = Transaction::Prescription {
            sender: Address::from_name("Dr. Green"),
            recipient: Address::from_name("Mr. Black"),
            prescription: "medicine9".into(),
            fee: 0.2,
        };
        registry.project(&tx, 3).unwrap();

        let event = registry.event("medicine9").unwrap();
        assert_eq!(event.kind(), EventKind::Prescription);
        assert!(event.incompatibilities().is_empty());
        assert_eq!(
            registry.patient_by_name("Mr. Black").unwrap().prescriptions(),
            ["medicine9"]
        );
    }

    #[test]
    fn test_label_of_other_kind_is_refused_untouched() {
        let mut registry = registry();
        let tx = Transaction::Diagnosis {
            sender: Address::from_name("Dr. Green"),
            recipient: Address::from_name("Mr. Black"),
            illness: "medicine1".into(),
            fee: 0.2,
        };

        assert!(matches!(
            registry.project(&tx, 1),
            Err(RegistryError::EventKindMismatch {
                registered: EventKind::Prescription,
                requested: EventKind::Disease,
                ..
            })
        ));
        assert_eq!(registry.event("medicine1").unwrap().chain().size(), 0);
        let black = registry.patient_by_name("Mr. Black").unwrap();
        assert!(black.illness_history().is_empty());
        assert_eq!(black.chain_size(), 0);
        assert_eq!(registry.doctor_by_name("Dr. Green").unwrap().chain().size(), 0);
    }

    #[test]
    fn test_failed_patient_append_keeps_history_and_reaches_other_chains() {
        let mut registry = registry();
        let patient = Address::from_name("Mr. Black");
        registry.patients.get_mut(&patient).unwrap().chain_mut().blocks_mut().clear();
        let tx = Transaction::Diagnosis {
            sender: Address::from_name("Dr. Green"),
            recipient: patient.clone(),
            illness: "illness1".into(),
            fee: 0.2,
        };

        assert!(matches!(
            registry.project(&tx, 1),
            Err(RegistryError::Chain {
                source: ChainError::Empty,
                ..
            })
        ));
        assert!(registry.patient(&patient).unwrap().illness_history().is_empty());
        assert_eq!(registry.doctor_by_name("Dr. Green").unwrap().chain().size(), 1);
        assert_eq!(registry.event("illness1").unwrap().chain().size(), 1);
    }

    #[test]
    fn test_verify_unknown_chain() {
        assert!(matches!(
            registry().verify_entity_chain("nobody"),
            Err(RegistryError::UnknownChain(_))
        ));
    }
}
