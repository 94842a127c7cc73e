//! Proof-of-work consensus for the Medchain ledger.
//!
//! Miners race to find a nonce over the previous block's nonce; the fastest
//! valid proof seals the screened pending transactions, entity state is
//! projected from the sealed block, and the winner collects the fees.

pub mod config;
pub mod engine;
pub mod fee;
pub mod miner;
pub mod pow_engine;
pub mod race;

pub use config::{ConfigError, ConsensusConfig, DEFAULT_DIFFICULTY};
pub use engine::{ConsensusEngine, ConsensusError, RoundPhase, SealedRound};
pub use miner::Miner;
pub use pow_engine::{proof_hash, validate_proof, ProofOfWork, ProofResult, SearchFailure};
