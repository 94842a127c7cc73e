//! Core data structures of the Medchain ledger: hash-linked blocks and
//! chains, transactions and their pending pool, the entity registry, the
//! transaction validator and the patient access gate.

pub mod access;
pub mod authority;
pub mod block;
pub mod chain;
pub mod identity;
pub mod ledger;
pub mod mempool;
pub mod record;
pub mod registry;
pub mod transaction;
pub mod validation;

pub use access::{AccessError, AccessGate, PatientHistory};
pub use authority::{Authority, IncompatibilityTable, DEFAULT_AUTHORITY_NAME};
pub use block::{Block, BlockPayload};
pub use chain::{Chain, ChainError, ChainViolation, VerificationReport};
pub use identity::{Address, Doctor, Patient};
pub use ledger::{Ledger, LedgerBlock, LedgerChain, LedgerPayload, GENESIS_NONCE, LEDGER_OWNER};
pub use mempool::{Mempool, SubmitError, DEFAULT_POOL_CAPACITY};
pub use record::{EntityRecord, EntityRole};
pub use registry::{EntityRegistry, EventKind, MedicalEvent, RegistryError};
pub use transaction::{Transaction, TransactionKind};
pub use validation::{Receipt, Rejection, Screening, TransactionValidator, Verdict};
