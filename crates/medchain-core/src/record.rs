//! Payload of entity-scoped chains.

use crate::block::{put_str, BlockPayload};
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    Patient,
    Doctor,
    Event,
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRole::Patient => f.write_str("patient"),
            EntityRole::Doctor => f.write_str("doctor"),
            EntityRole::Event => f.write_str("event"),
        }
    }
}

/// One entry on a patient, doctor or event chain. Every non-genesis record
/// points back at the ledger block that sealed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityRecord {
    Genesis {
        owner: String,
        role: EntityRole,
    },
    Diagnosis {
        illness: String,
        patient: Address,
        doctor: Address,
        ledger_index: u64,
    },
    Prescription {
        prescription: String,
        patient: Address,
        doctor: Address,
        ledger_index: u64,
    },
    Authorization {
        doctor: Address,
        authority: Address,
        ledger_index: u64,
    },
}

impl EntityRecord {
    pub fn genesis(owner: &str, role: EntityRole) -> Self {
        EntityRecord::Genesis {
            owner: owner.to_string(),
            role,
        }
    }

    /// Ledger block that produced this record, if any.
    pub fn ledger_index(&self) -> Option<u64> {
        match self {
            EntityRecord::Genesis { .. } => None,
            EntityRecord::Diagnosis { ledger_index, .. }
            | EntityRecord::Prescription { ledger_index, .. }
            | EntityRecord::Authorization { ledger_index, .. } => Some(*ledger_index),
        }
    }
}

impl BlockPayload for EntityRecord {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            EntityRecord::Genesis { owner, role } => {
                out.push(0);
                put_str(&mut out, owner);
                put_str(&mut out, &role.to_string());
            }
            EntityRecord::Diagnosis {
                illness,
                patient,
                doctor,
                ledger_index,
            } => {
                out.push(1);
                put_str(&mut out, illness);
                put_str(&mut out, patient.as_str());
                put_str(&mut out, doctor.as_str());
                out.extend_from_slice(&ledger_index.to_le_bytes());
            }
            EntityRecord::Prescription {
                prescription,
                patient,
                doctor,
                ledger_index,
            } => {
                out.push(2);
                put_str(&mut out, prescription);
                put_str(&mut out, patient.as_str());
                put_str(&mut out, doctor.as_str());
                out.extend_from_slice(&ledger_index.to_le_bytes());
            }
            EntityRecord::Authorization {
                doctor,
                authority,
                ledger_index,
            } => {
                out.push(3);
                put_str(&mut out, doctor.as_str());
                put_str(&mut out, authority.as_str());
                out.extend_from_slice(&ledger_index.to_le_bytes());
            }
        }
        out
    }
}
