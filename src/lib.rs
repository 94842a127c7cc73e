//! Medchain: an append-only, hash-linked ledger of medical events.
//!
//! Doctors authorized by a central authority diagnose and prescribe to
//! patients; miners race a proof of work to seal the screened transactions
//! into the ledger and collect their fees. Patient history is readable only
//! through a key gate that rotates the temporary key after every read.
//!
//! `HealthLedger` is the entry point; the member crates hold the pieces:
//!
//! - `medchain_crypto`: hashing, authority signatures, access keys
//! - `medchain_core`: blocks, chains, transactions, registry, validation, gate
//! - `medchain_consensus`: proof of work, miners, rounds, fee settlement

pub mod settings;

pub use medchain_consensus::{
    ConsensusConfig, ConsensusEngine, ConsensusError, Miner, RoundPhase, SealedRound,
};
pub use medchain_core::{
    AccessError, Address, Authority, Block, Chain, ChainViolation, Doctor, EntityRecord,
    LedgerBlock, LedgerChain, MedicalEvent, Patient, PatientHistory, Receipt, RegistryError,
    Rejection, SubmitError, Transaction, VerificationReport,
};
pub use medchain_crypto::{AccessSecretKey, AuthorizationToken};

use medchain_core::EntityRegistry;

pub struct HealthLedger {
    engine: ConsensusEngine,
}

impl HealthLedger {
    pub fn new(config: ConsensusConfig, authority: Authority) -> Result<Self, ConsensusError> {
        let engine = ConsensusEngine::new(config, EntityRegistry::new(authority))?;
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    pub fn authority(&self) -> &Authority {
        self.engine.registry().authority()
    }

    // Registration

    pub fn register_patient(&mut self, patient: Patient) -> Result<Address, RegistryError> {
        self.engine.registry_mut().register_patient(patient)
    }

    pub fn register_doctor(&mut self, doctor: Doctor) -> Result<Address, RegistryError> {
        self.engine.registry_mut().register_doctor(doctor)
    }

    pub fn register_disease(&mut self, name: &str) -> Result<(), RegistryError> {
        self.engine.registry_mut().register_disease(name)
    }

    pub fn register_prescription<I, S>(&mut self, name: &str, incompatible_illnesses: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engine
            .registry_mut()
            .register_prescription(name, incompatible_illnesses)
    }

    // Submission; each returns the index of the block expected to seal it.

    /// The authority signs `doctor`'s address and submits the authorization.
    pub fn submit_authorization(&mut self, doctor: &Address, fee: f64) -> Result<u64, SubmitError> {
        let token = self.authority().authorize(doctor);
        self.submit_authorization_token(doctor, token, fee)
    }

    /// Submit an authorization carrying a token produced elsewhere. It is
    /// sealed only if the token verifies under the authority's key.
    pub fn submit_authorization_token(
        &mut self,
        doctor: &Address,
        token: AuthorizationToken,
        fee: f64,
    ) -> Result<u64, SubmitError> {
        let tx = Transaction::Authorization {
            sender: self.authority().address().clone(),
            recipient: doctor.clone(),
            signature: token,
            fee,
        };
        self.engine.submit(tx)
    }

    pub fn submit_diagnosis(
        &mut self,
        doctor: &Address,
        patient: &Address,
        illness: &str,
        fee: f64,
    ) -> Result<u64, SubmitError> {
        self.engine.submit(Transaction::Diagnosis {
            sender: doctor.clone(),
            recipient: patient.clone(),
            illness: illness.to_string(),
            fee,
        })
    }

    pub fn submit_prescription(
        &mut self,
        doctor: &Address,
        patient: &Address,
        prescription: &str,
        fee: f64,
    ) -> Result<u64, SubmitError> {
        self.engine.submit(Transaction::Prescription {
            sender: doctor.clone(),
            recipient: patient.clone(),
            prescription: prescription.to_string(),
            fee,
        })
    }

    // Consensus

    /// `count` miners starting from the current ledger, named miner1..minerN.
    pub fn spawn_miners(&self, count: usize) -> Vec<Miner> {
        (1..=count)
            .map(|i| self.engine.spawn_miner(format!("miner{i}")))
            .collect()
    }

    pub fn mine(&mut self, miners: &mut [Miner]) -> Result<SealedRound, ConsensusError> {
        self.engine.mine(miners)
    }

    // Verification and reads

    pub fn verify(&self) -> VerificationReport {
        self.engine.verify()
    }

    pub fn verify_entity_chain(&self, name: &str) -> Result<VerificationReport, RegistryError> {
        self.engine.registry().verify_entity_chain(name)
    }

    pub fn get_chain(&self) -> &LedgerChain {
        self.engine.ledger().chain()
    }

    pub fn get_block(&self, n: usize) -> Option<&LedgerBlock> {
        self.get_chain().get_block(n)
    }

    pub fn pending(&self) -> usize {
        self.engine.ledger().pending().len()
    }

    pub fn patient(&self, address: &Address) -> Option<&Patient> {
        self.engine.registry().patient(address)
    }

    pub fn doctor(&self, address: &Address) -> Option<&Doctor> {
        self.engine.registry().doctor(address)
    }

    pub fn event(&self, name: &str) -> Option<&MedicalEvent> {
        self.engine.registry().event(name)
    }

    /// Gated; rotates the patient's temporary key on success.
    pub fn read_history(
        &mut self,
        patient: &Address,
        key: Option<&AccessSecretKey>,
    ) -> Result<PatientHistory, AccessError> {
        self.engine.registry_mut().read_history(patient, key)
    }

    /// Gated; rotates the patient's temporary key on success.
    pub fn read_patient_chain(
        &mut self,
        patient: &Address,
        key: Option<&AccessSecretKey>,
    ) -> Result<Chain<EntityRecord>, AccessError> {
        self.engine.registry_mut().read_patient_chain(patient, key)
    }

    /// Gated; rotates the patient's temporary key on success.
    pub fn read_patient_block(
        &mut self,
        patient: &Address,
        n: usize,
        key: Option<&AccessSecretKey>,
    ) -> Result<Option<Block<EntityRecord>>, AccessError> {
        self.engine.registry_mut().read_patient_block(patient, n, key)
    }
}
