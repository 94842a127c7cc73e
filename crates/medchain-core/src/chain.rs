//! Append-only hash-linked chain, shared by entity chains and the ledger.

use crate::block::{fresh_timestamp, Block, BlockPayload};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First invariant broken by a block, as reported by `Chain::verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ChainViolation {
    #[error("Wrong block index at block {index} (found {found}).")]
    WrongIndex { index: usize, found: u64 },

    #[error("Wrong previous hash at block {index}.")]
    WrongPreviousHash { index: usize },

    #[error("Wrong hash at block {index}.")]
    WrongHash { index: usize },

    #[error("Backdating at block {index}.")]
    Backdating { index: usize },
}

impl ChainViolation {
    /// Position of the offending block.
    pub fn index(&self) -> usize {
        match self {
            ChainViolation::WrongIndex { index, .. }
            | ChainViolation::WrongPreviousHash { index }
            | ChainViolation::WrongHash { index }
            | ChainViolation::Backdating { index } => *index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain integrity violated: {}", format_violations(.0))]
    IntegrityViolation(Vec<ChainViolation>),

    #[error("refusing to append to corrupt chain: {0}")]
    Corrupt(ChainViolation),

    #[error("a chain needs at least a genesis block")]
    Empty,
}

fn format_violations(violations: &[ChainViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of a full chain scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub owner: String,
    pub blocks_checked: usize,
    pub violations: Vec<ChainViolation>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> Result<(), ChainError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ChainError::IntegrityViolation(self.violations))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StoredChain<P>")]
pub struct Chain<P> {
    owner: String,
    blocks: Vec<Block<P>>,
}

/// Wire shape of a chain before the genesis check.
#[derive(Deserialize)]
struct StoredChain<P> {
    owner: String,
    blocks: Vec<Block<P>>,
}

impl<P> TryFrom<StoredChain<P>> for Chain<P> {
    type Error = ChainError;

    fn try_from(stored: StoredChain<P>) -> Result<Self, ChainError> {
        if stored.blocks.is_empty() {
            return Err(ChainError::Empty);
        }
        Ok(Self {
            owner: stored.owner,
            blocks: stored.blocks,
        })
    }
}

impl<P: BlockPayload> Chain<P> {
    /// Always initialize a genesis block when creating a new chain.
    pub fn new(owner: impl Into<String>, genesis_payload: P) -> Self {
        Self {
            owner: owner.into(),
            blocks: vec![Block::genesis(genesis_payload)],
        }
    }

    /// Adopt an existing block sequence as-is. Call `verify` before trusting it.
    pub fn from_blocks(owner: impl Into<String>, blocks: Vec<Block<P>>) -> Result<Self, ChainError> {
        Self::try_from(StoredChain {
            owner: owner.into(),
            blocks,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Chains always hold a genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of blocks excluding genesis.
    pub fn size(&self) -> usize {
        self.blocks.len().saturating_sub(1)
    }

    pub fn blocks(&self) -> &[Block<P>] {
        &self.blocks
    }

    pub fn get_block(&self, n: usize) -> Option<&Block<P>> {
        self.blocks.get(n)
    }

    pub fn last_block(&self) -> Option<&Block<P>> {
        self.blocks.last()
    }

    /// Append a new block on top of the current tail.
    ///
    /// The tail is checked first; a corrupt tail refuses the append. A block
    /// that fails its own post-append check is logged, not rolled back, and
    /// blocks every later append through the tail check.
    pub fn append(&mut self, payload: P) -> Result<&Block<P>, ChainError> {
        let tail = self.check_tail()?;
        let block = Block::new(
            self.blocks.len() as u64,
            fresh_timestamp(tail.timestamp),
            payload,
            tail.hash.clone(),
        );
        self.blocks.push(block);

        let index = self.blocks.len() - 1;
        if let Some(violation) = self.check_block(index) {
            log::warn!("chain {}: appended block failed verification: {}", self.owner, violation);
        }

        Ok(&self.blocks[index])
    }

    /// Verify data integrity:
    ///
    /// * index in `blocks[i]` is `i`, there are no missing or extra blocks;
    /// * previous hashes link to the re-derived hash of the predecessor;
    /// * every stored hash matches its block;
    /// * there is no backdating.
    ///
    /// Every block is checked; the first violated invariant of each failing
    /// block is reported.
    pub fn verify(&self) -> VerificationReport {
        let violations: Vec<ChainViolation> = (1..self.blocks.len())
            .filter_map(|i| self.check_block(i))
            .collect();

        for violation in &violations {
            log::warn!("chain {}: {}", self.owner, violation);
        }

        VerificationReport {
            owner: self.owner.clone(),
            blocks_checked: self.blocks.len(),
            violations,
        }
    }

    /// Pretty JSON projection of the whole chain.
    pub fn to_json(&self) -> Result<String, serde_json::Error>
    where
        P: Serialize,
    {
        serde_json::to_string_pretty(self)
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block<P>> {
        &mut self.blocks
    }

    fn check_block(&self, i: usize) -> Option<ChainViolation> {
        let block = &self.blocks[i];
        if i == 0 {
            return (!block.is_sealed_correctly()).then_some(ChainViolation::WrongHash { index: 0 });
        }

        let prev = &self.blocks[i - 1];
        if block.index != i as u64 {
            return Some(ChainViolation::WrongIndex {
                index: i,
                found: block.index,
            });
        }
        if block.previous_hash != prev.compute_hash() {
            return Some(ChainViolation::WrongPreviousHash { index: i });
        }
        if !block.is_sealed_correctly() {
            return Some(ChainViolation::WrongHash { index: i });
        }
        if prev.timestamp >= block.timestamp {
            return Some(ChainViolation::Backdating { index: i });
        }
        None
    }

    fn check_tail(&self) -> Result<&Block<P>, ChainError> {
        let Some(index) = self.blocks.len().checked_sub(1) else {
            log::error!("chain {}: no genesis block", self.owner);
            return Err(ChainError::Empty);
        };
        match self.check_block(index) {
            Some(violation) => {
                log::error!("chain {}: tail is corrupt: {}", self.owner, violation);
                Err(ChainError::Corrupt(violation))
            }
            None => Ok(&self.blocks[index]),
        }
    }
}
