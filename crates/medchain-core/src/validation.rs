//! Screening of pending transactions before they are sealed.
//!
//! A batch is screened in submission order against the registry as it stood
//! before the round. Accepted transactions are staged, so a later transaction
//! in the same batch sees an authorization or illness accepted before it.

use crate::identity::Address;
use crate::registry::{EntityRegistry, EventKind};
use crate::transaction::Transaction;
use medchain_crypto::AuthorizationToken;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum Rejection {
    #[error("authorization for doctor {doctor} is not signed by the authority")]
    InvalidAuthorizationSignature { doctor: String },

    #[error("not a valid authorization (doctor {doctor})")]
    NotAuthorized { doctor: String },

    #[error("prescription {prescription} is incompatible with {}", .conflicts.join(", "))]
    Incompatible {
        prescription: String,
        conflicts: Vec<String>,
    },

    #[error("unknown participant {address}")]
    UnknownParticipant { address: String },

    #[error("{label} is a {registered}, not a {requested}")]
    WrongEventKind {
        label: String,
        registered: EventKind,
        requested: EventKind,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

/// Outcome of one transaction in a sealing round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction: Transaction,
    pub verdict: Verdict,
}

impl Receipt {
    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.verdict {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Screening {
    pub accepted: Vec<Transaction>,
    pub receipts: Vec<Receipt>,
}

pub struct TransactionValidator<'a> {
    registry: &'a EntityRegistry,
    staged_tokens: HashMap<Address, AuthorizationToken>,
    staged_illnesses: HashMap<Address, Vec<String>>,
    staged_events: HashMap<String, EventKind>,
}

impl<'a> TransactionValidator<'a> {
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self {
            registry,
            staged_tokens: HashMap::new(),
            staged_illnesses: HashMap::new(),
            staged_events: HashMap::new(),
        }
    }

    /// Screen a batch, keeping submission order in both outputs.
    pub fn screen(mut self, batch: Vec<Transaction>) -> Screening {
        let mut screening = Screening::default();
        for transaction in batch {
            let verdict = match self.check(&transaction) {
                Ok(()) => {
                    self.stage(&transaction);
                    screening.accepted.push(transaction.clone());
                    Verdict::Accepted
                }
                Err(reason) => {
                    log::warn!("rejected {}: {}", transaction, reason);
                    Verdict::Rejected(reason)
                }
            };
            screening.receipts.push(Receipt { transaction, verdict });
        }
        log::info!(
            "screened {} transactions, {} accepted",
            screening.receipts.len(),
            screening.accepted.len()
        );
        screening
    }

    pub fn check(&self, transaction: &Transaction) -> Result<(), Rejection> {
        match transaction {
            Transaction::Authorization {
                recipient, signature, ..
            } => {
                if self.registry.doctor(recipient).is_none() {
                    return Err(unknown(recipient));
                }
                self.registry
                    .authority()
                    .verify_authorization(recipient, signature)
                    .map_err(|_| Rejection::InvalidAuthorizationSignature {
                        doctor: recipient.to_string(),
                    })
            }
            Transaction::Diagnosis {
                sender,
                recipient,
                illness,
                ..
            } => {
                self.check_doctor(sender)?;
                self.check_patient(recipient)?;
                self.check_event_kind(illness, EventKind::Disease)
            }
            Transaction::Prescription {
                sender,
                recipient,
                prescription,
                ..
            } => {
                self.check_doctor(sender)?;
                let history = self.check_patient(recipient)?;
                self.check_event_kind(prescription, EventKind::Prescription)?;
                let conflicts = self
                    .registry
                    .authority()
                    .incompatibilities()
                    .conflicts(prescription, &history);
                if conflicts.is_empty() {
                    Ok(())
                } else {
                    Err(Rejection::Incompatible {
                        prescription: prescription.clone(),
                        conflicts,
                    })
                }
            }
        }
    }

    /// The sender must be a registered doctor holding a token that verifies
    /// over its own address.
    fn check_doctor(&self, sender: &Address) -> Result<(), Rejection> {
        let doctor = self.registry.doctor(sender).ok_or_else(|| unknown(sender))?;
        let token = self
            .staged_tokens
            .get(sender)
            .or_else(|| doctor.authorization())
            .ok_or_else(|| Rejection::NotAuthorized {
                doctor: sender.to_string(),
            })?;
        self.registry
            .authority()
            .verify_authorization(sender, token)
            .map_err(|_| Rejection::NotAuthorized {
                doctor: sender.to_string(),
            })
    }

    /// Returns the illness history including illnesses staged this round.
    fn check_patient(&self, recipient: &Address) -> Result<Vec<String>, Rejection> {
        let patient = self.registry.patient(recipient).ok_or_else(|| unknown(recipient))?;
        let mut history = patient.illness_history().to_vec();
        if let Some(staged) = self.staged_illnesses.get(recipient) {
            history.extend(staged.iter().cloned());
        }
        Ok(history)
    }

    /// A label keeps the kind it was first registered or sealed under.
    fn check_event_kind(&self, label: &str, requested: EventKind) -> Result<(), Rejection> {
        let registered = self
            .registry
            .event_kind(label)
            .or_else(|| self.staged_events.get(label).copied());
        match registered {
            Some(registered) if registered != requested => Err(Rejection::WrongEventKind {
                label: label.to_string(),
                registered,
                requested,
            }),
            _ => Ok(()),
        }
    }

    fn stage(&mut self, transaction: &Transaction) {
        match transaction {
            Transaction::Authorization {
                recipient, signature, ..
            } => {
                self.staged_tokens.insert(recipient.clone(), signature.clone());
            }
            Transaction::Diagnosis {
                recipient, illness, ..
            } => {
                self.staged_illnesses
                    .entry(recipient.clone())
                    .or_default()
                    .push(illness.clone());
                self.staged_events.entry(illness.clone()).or_insert(EventKind::Disease);
            }
            Transaction::Prescription { prescription, .. } => {
                self.staged_events
                    .entry(prescription.clone())
                    .or_insert(EventKind::Prescription);
            }
        }
    }
}

fn unknown(address: &Address) -> Rejection {
    Rejection::UnknownParticipant {
        address: address.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::Authority;
    use crate::identity::{Doctor, Patient};
    use medchain_crypto::AuthorityKeyPair;

    struct Fixture {
        registry: EntityRegistry,
        patient: Address,
        doctor: Address,
    }

    fn fixture() -> Fixture {
        let mut registry = EntityRegistry::new(Authority::new());
        let patient = registry.register_patient(Patient::new("Mr. Black")).unwrap();
        let doctor = registry.register_doctor(Doctor::new("Dr. Green")).unwrap();
        registry.register_disease("illness1").unwrap();
        registry.register_prescription("medicine1", ["illness1", "illness2"]).unwrap();
        registry.register_prescription("medicine3", ["illness3"]).unwrap();
        Fixture {
            registry,
            patient,
            doctor,
        }
    }

    fn authorization(f: &Fixture) -> Transaction {
        Transaction::Authorization {
            sender: f.registry.authority().address().clone(),
            recipient: f.doctor.clone(),
            signature: f.registry.authority().authorize(&f.doctor),
            fee: 0.5,
        }
    }

    fn diagnosis(f: &Fixture, illness: &str) -> Transaction {
        Transaction::Diagnosis {
            sender: f.doctor.clone(),
            recipient: f.patient.clone(),
            illness: illness.into(),
            fee: 0.2,
        }
    }

    fn prescription(f: &Fixture, name: &str) -> Transaction {
        Transaction::Prescription {
            sender: f.doctor.clone(),
            recipient: f.patient.clone(),
            prescription: name.into(),
            fee: 0.2,
        }
    }

    #[test]
    fn test_unauthorized_doctor_is_rejected() {
        let f = fixture();
        let verdict = TransactionValidator::new(&f.registry).check(&diagnosis(&f, "illness1"));
        assert!(matches!(verdict, Err(Rejection::NotAuthorized { .. })));
    }

    #[test]
    fn test_forged_authorization_is_rejected() {
        let f = fixture();
        let impostor = AuthorityKeyPair::generate();
        let forged = Transaction::Authorization {
            sender: f.registry.authority().address().clone(),
            recipient: f.doctor.clone(),
            signature: impostor.sign(f.doctor.as_bytes()),
            fee: 0.5,
        };
        let verdict = TransactionValidator::new(&f.registry).check(&forged);
        assert!(matches!(verdict, Err(Rejection::InvalidAuthorizationSignature { .. })));
    }

    #[test]
    fn test_authorization_in_batch_enables_later_diagnosis() {
        let f = fixture();
        let screening = TransactionValidator::new(&f.registry)
            .screen(vec![diagnosis(&f, "illness1"), authorization(&f), diagnosis(&f, "illness2")]);

        let accepted: Vec<bool> = screening.receipts.iter().map(Receipt::is_accepted).collect();
        assert_eq!(accepted, vec![false, true, true]);
        assert_eq!(screening.accepted.len(), 2);
    }

    #[test]
    fn test_incompatible_prescription_is_vetoed() {
        let f = fixture();
        let screening = TransactionValidator::new(&f.registry).screen(vec![
            authorization(&f),
            diagnosis(&f, "illness1"),
            prescription(&f, "medicine3"),
            prescription(&f, "medicine1"),
        ]);

        assert_eq!(screening.accepted.len(), 3);
        assert_eq!(
            screening.receipts[3].rejection(),
            Some(&Rejection::Incompatible {
                prescription: "medicine1".into(),
                conflicts: vec!["illness1".into()],
            })
        );
    }

    #[test]
    fn test_unknown_patient_is_rejected() {
        let f = fixture();
        let mut tx = diagnosis(&f, "illness1");
        if let Transaction::Diagnosis { recipient, .. } = &mut tx {
            *recipient = Address::from_name("Nobody");
        }
        let screening = TransactionValidator::new(&f.registry).screen(vec![authorization(&f), tx]);
        assert!(matches!(
            screening.receipts[1].rejection(),
            Some(Rejection::UnknownParticipant { .. })
        ));
    }

    #[test]
    fn test_label_keeps_its_event_kind() {
        let f = fixture();
        let screening = TransactionValidator::new(&f.registry).screen(vec![
            authorization(&f),
            diagnosis(&f, "medicine1"),
            prescription(&f, "illness1"),
            diagnosis(&f, "illness9"),
            prescription(&f, "illness9"),
        ]);

        let accepted: Vec<bool> = screening.receipts.iter().map(Receipt::is_accepted).collect();
        assert_eq!(accepted, vec![true, false, false, true, false]);
        assert_eq!(
            screening.receipts[1].rejection(),
            Some(&Rejection::WrongEventKind {
                label: "medicine1".into(),
                registered: EventKind::Prescription,
                requested: EventKind::Disease,
            })
        );
    }

    #[test]
    fn test_rejection_message() {
        let reason = Rejection::NotAuthorized { doctor: "d".into() };
        assert!(reason.to_string().starts_with("not a valid authorization"));
    }
}
