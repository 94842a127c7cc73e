use crate::block::put_str;
use crate::identity::Address;
use medchain_crypto::AuthorizationToken;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Diagnosis,
    Authorization,
    Prescription,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Diagnosis => f.write_str("diagnosis"),
            TransactionKind::Authorization => f.write_str("authorization"),
            TransactionKind::Prescription => f.write_str("prescription"),
        }
    }
}

/// A pending or sealed ledger entry. Participants are referenced by address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    /// Doctor records an illness on a patient.
    Diagnosis {
        sender: Address,
        recipient: Address,
        illness: String,
        fee: f64,
    },
    /// Authority certifies a doctor; `signature` covers the recipient address.
    Authorization {
        sender: Address,
        recipient: Address,
        signature: AuthorizationToken,
        fee: f64,
    },
    /// Doctor prescribes to a patient.
    Prescription {
        sender: Address,
        recipient: Address,
        prescription: String,
        fee: f64,
    },
}

impl Transaction {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Diagnosis { .. } => TransactionKind::Diagnosis,
            Transaction::Authorization { .. } => TransactionKind::Authorization,
            Transaction::Prescription { .. } => TransactionKind::Prescription,
        }
    }

    pub fn sender(&self) -> &Address {
        match self {
            Transaction::Diagnosis { sender, .. }
            | Transaction::Authorization { sender, .. }
            | Transaction::Prescription { sender, .. } => sender,
        }
    }

    pub fn recipient(&self) -> &Address {
        match self {
            Transaction::Diagnosis { recipient, .. }
            | Transaction::Authorization { recipient, .. }
            | Transaction::Prescription { recipient, .. } => recipient,
        }
    }

    pub fn fee(&self) -> f64 {
        match self {
            Transaction::Diagnosis { fee, .. }
            | Transaction::Authorization { fee, .. }
            | Transaction::Prescription { fee, .. } => *fee,
        }
    }

    /// Hash input for ledger blocks.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(match self.kind() {
            TransactionKind::Diagnosis => 0u8,
            TransactionKind::Authorization => 1,
            TransactionKind::Prescription => 2,
        });
        put_str(&mut out, self.sender().as_str());
        put_str(&mut out, self.recipient().as_str());
        match self {
            Transaction::Diagnosis { illness, .. } => put_str(&mut out, illness),
            Transaction::Authorization { signature, .. } => {
                out.extend_from_slice(&(signature.as_bytes().len() as u32).to_le_bytes());
                out.extend_from_slice(signature.as_bytes());
            }
            Transaction::Prescription { prescription, .. } => put_str(&mut out, prescription),
        }
        out.extend_from_slice(&self.fee().to_bits().to_le_bytes());
        out
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transaction::Diagnosis { illness, .. } => write!(
                f,
                "diagnosis '{}' {} -> {}",
                illness,
                self.sender().short(),
                self.recipient().short()
            ),
            Transaction::Authorization { .. } => write!(
                f,
                "authorization {} -> {}",
                self.sender().short(),
                self.recipient().short()
            ),
            Transaction::Prescription { prescription, .. } => write!(
                f,
                "prescription '{}' {} -> {}",
                prescription,
                self.sender().short(),
                self.recipient().short()
            ),
        }
    }
}
