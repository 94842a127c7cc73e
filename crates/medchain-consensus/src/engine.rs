// Consensus engine: owns the ledger and the entity registry and runs one
// sealing round at a time.
//
// ROUND INVARIANTS:
// 1. Idle -> Racing -> Sealing -> Broadcasting -> Idle, serialized by &mut self
// 2. Entity state changes only after validation and before fee settlement
// 3. A failed round seals nothing and leaves the pending pool as it was
// 4. Only the winner is credited, with the rounded sum of the sealed fees
// 5. Every miner in a race searches the ledger's current last nonce

use crate::config::{ConfigError, ConsensusConfig};
use crate::fee;
use crate::miner::Miner;
use crate::pow_engine::{ProofOfWork, SearchFailure};
use crate::race;
use medchain_core::{
    ChainError, EntityRegistry, Ledger, LedgerBlock, Receipt, SubmitError, Transaction,
    TransactionValidator, VerificationReport,
};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Idle,
    Racing,
    Sealing,
    Broadcasting,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::Idle => f.write_str("idle"),
            RoundPhase::Racing => f.write_str("racing"),
            RoundPhase::Sealing => f.write_str("sealing"),
            RoundPhase::Broadcasting => f.write_str("broadcasting"),
        }
    }
}

/// Consensus engine errors.
#[derive(Debug)]
pub enum ConsensusError {
    /// `mine` was called without any miner
    NoWorkers,

    /// No miner produced a valid proof within its bounds
    Stalled { failures: Vec<SearchFailure> },

    /// The ledger failed verification or refused the sealed block
    Chain(ChainError),

    /// Engine configuration rejected at construction
    Config(ConfigError),
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::NoWorkers => write!(f, "Consensus round needs at least one miner"),
            ConsensusError::Stalled { failures } => {
                write!(f, "Consensus stalled: no valid proof from {} miners", failures.len())?;
                if let Some(first) = failures.first() {
                    write!(f, " ({})", first)?;
                }
                Ok(())
            }
            ConsensusError::Chain(e) => write!(f, "Ledger error: {}", e),
            ConsensusError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConsensusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConsensusError::Chain(e) => Some(e),
            ConsensusError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ChainError> for ConsensusError {
    fn from(e: ChainError) -> Self {
        ConsensusError::Chain(e)
    }
}

impl From<ConfigError> for ConsensusError {
    fn from(e: ConfigError) -> Self {
        ConsensusError::Config(e)
    }
}

/// Result of one successful round.
#[derive(Debug, Clone)]
pub struct SealedRound {
    pub block: LedgerBlock,
    /// Position of the winner in the miner slice
    pub winner: usize,
    pub winner_id: String,
    pub receipts: Vec<Receipt>,
    pub reward: f64,
    /// Winner's search time
    pub proof_time: Duration,
}

impl SealedRound {
    pub fn accepted(&self) -> impl Iterator<Item = &Transaction> {
        self.block.payload().transactions.iter()
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Receipt> {
        self.receipts.iter().filter(|r| !r.is_accepted())
    }
}

pub struct ConsensusEngine {
    config: ConsensusConfig,
    pow: ProofOfWork,
    ledger: Ledger,
    registry: EntityRegistry,
    phase: RoundPhase,
    rounds: u64,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig, registry: EntityRegistry) -> Result<Self, ConsensusError> {
        Self::with_ledger(config, registry, Ledger::new())
    }

    pub fn with_ledger(
        config: ConsensusConfig,
        registry: EntityRegistry,
        ledger: Ledger,
    ) -> Result<Self, ConsensusError> {
        config.validate()?;
        info!(
            difficulty = config.difficulty,
            max_attempts = config.max_attempts,
            "consensus engine ready"
        );
        Ok(Self {
            pow: ProofOfWork::new(&config),
            config,
            ledger,
            registry,
            phase: RoundPhase::Idle,
            rounds: 0,
        })
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Registration and gated reads. Ledger-driven changes go through `mine`.
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Miner starting from the current ledger.
    pub fn spawn_miner(&self, id: impl Into<String>) -> Miner {
        Miner::new(id, self.ledger.snapshot())
    }

    pub fn submit(&mut self, transaction: Transaction) -> Result<u64, SubmitError> {
        self.ledger.submit(transaction)
    }

    pub fn validate_proof(&self, last_nonce: u64, nonce: u64) -> bool {
        self.pow.validate_proof(last_nonce, nonce)
    }

    pub fn verify(&self) -> VerificationReport {
        self.ledger.verify()
    }

    /// Run one round: race, seal, project, settle, broadcast.
    pub fn mine(&mut self, miners: &mut [Miner]) -> Result<SealedRound, ConsensusError> {
        if miners.is_empty() {
            return Err(ConsensusError::NoWorkers);
        }
        let result = self.run_round(miners);
        self.enter(RoundPhase::Idle);
        if let Err(e) = &result {
            error!(round = self.rounds + 1, "round failed: {}", e);
        }
        result
    }

    fn run_round(&mut self, miners: &mut [Miner]) -> Result<SealedRound, ConsensusError> {
        let started = Instant::now();
        let last_nonce = self.ledger.last_nonce();

        self.enter(RoundPhase::Racing);
        let snapshot = self.ledger.snapshot();
        for miner in miners.iter_mut().filter(|m| m.chain().len() != snapshot.len()) {
            debug!(miner = miner.id(), "refreshing stale snapshot");
            miner.receive_chain(snapshot.clone());
        }
        let is_valid = |nonce: u64| self.pow.validate_proof(last_nonce, nonce);
        let entries = race::run(&self.pow, miners, last_nonce);
        let Some(winner) = race::select_winner(&entries, is_valid) else {
            let failures = race::failures(entries, is_valid);
            return Err(ConsensusError::Stalled { failures });
        };
        debug!(
            worker = winner.worker,
            nonce = winner.proof.nonce,
            elapsed_us = winner.proof.elapsed.as_micros() as u64,
            "race won"
        );

        self.enter(RoundPhase::Sealing);
        self.ledger.verify().into_result()?;
        let batch = self.ledger.take_pending();
        let screening = TransactionValidator::new(&self.registry).screen(batch.clone());
        let block = match self.ledger.seal(winner.proof.nonce, screening.accepted) {
            Ok(block) => block,
            Err(e) => {
                self.ledger.restore_pending(batch);
                return Err(e.into());
            }
        };

        for transaction in &block.payload().transactions {
            if let Err(e) = self.registry.project(transaction, block.index()) {
                warn!(block = block.index(), "entity projection failed: {}", e);
            }
        }

        let reward = fee::settle(&block.payload().transactions, self.config.fee_precision);
        miners[winner.worker].credit(reward, self.config.fee_precision);

        self.enter(RoundPhase::Broadcasting);
        let snapshot = self.ledger.snapshot();
        for miner in miners.iter_mut() {
            miner.receive_chain(snapshot.clone());
        }

        self.rounds += 1;
        let winner_id = miners[winner.worker].id().to_string();
        info!(
            block = block.index(),
            winner = %winner_id,
            sealed = block.payload().transactions.len(),
            rejected = screening.receipts.len() - block.payload().transactions.len(),
            reward,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "block sealed"
        );

        Ok(SealedRound {
            block,
            winner: winner.worker,
            winner_id,
            receipts: screening.receipts,
            reward,
            proof_time: winner.proof.elapsed,
        })
    }

    fn enter(&mut self, phase: RoundPhase) {
        debug!(from = %self.phase, to = %phase, "round phase");
        self.phase = phase;
    }
}
