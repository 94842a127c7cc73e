// Proof of work over the previous block's nonce.
//
// A nonce is valid for `last_nonce` when sha256("{last_nonce}{nonce}") starts
// with `difficulty` hex zeros. Searches start at 0 and are bounded both by
// attempts and by wall-clock time.

use crate::config::ConsensusConfig;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Attempts between two clock reads during a search.
const CLOCK_CHECK_INTERVAL: u64 = 1024;

/// Hex digest a proof is judged on.
pub fn proof_hash(last_nonce: u64, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}", last_nonce, nonce));
    hex::encode(hasher.finalize())
}

/// Pure and deterministic proof check.
pub fn validate_proof(last_nonce: u64, nonce: u64, difficulty: usize) -> bool {
    let hash = proof_hash(last_nonce, nonce);
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// A found proof and what it cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofResult {
    pub nonce: u64,
    pub attempts: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFailure {
    Exhausted { attempts: u64 },
    TimedOut { elapsed: Duration },
    /// A proof came back but does not hold for the round's puzzle
    Rejected { nonce: u64 },
}

impl fmt::Display for SearchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchFailure::Exhausted { attempts } => {
                write!(f, "no proof within {} attempts", attempts)
            }
            SearchFailure::TimedOut { elapsed } => {
                write!(f, "no proof after {} ms", elapsed.as_millis())
            }
            SearchFailure::Rejected { nonce } => {
                write!(f, "proof {} does not hold for the current tail", nonce)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: usize,
    max_attempts: u64,
    stall_timeout: Duration,
}

impl ProofOfWork {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            difficulty: config.difficulty,
            max_attempts: config.max_attempts,
            stall_timeout: Duration::from_millis(config.stall_timeout_ms),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn validate_proof(&self, last_nonce: u64, nonce: u64) -> bool {
        validate_proof(last_nonce, nonce, self.difficulty)
    }

    /// Find the smallest valid nonce for `last_nonce`, timing the search.
    pub fn search(&self, last_nonce: u64) -> Result<ProofResult, SearchFailure> {
        let started = Instant::now();
        for nonce in 0..self.max_attempts {
            if self.validate_proof(last_nonce, nonce) {
                let elapsed = started.elapsed();
                debug!(
                    difficulty = self.difficulty,
                    nonce,
                    elapsed_us = elapsed.as_micros() as u64,
                    "PoW found"
                );
                return Ok(ProofResult {
                    nonce,
                    attempts: nonce + 1,
                    elapsed,
                });
            }
            if nonce % CLOCK_CHECK_INTERVAL == CLOCK_CHECK_INTERVAL - 1 {
                let elapsed = started.elapsed();
                if elapsed >= self.stall_timeout {
                    info!(last_nonce, attempts = nonce + 1, "PoW search timed out");
                    return Err(SearchFailure::TimedOut { elapsed });
                }
            }
        }
        info!(
            last_nonce,
            max_attempts = self.max_attempts,
            difficulty = self.difficulty,
            "Could not find PoW within attempt budget"
        );
        Err(SearchFailure::Exhausted {
            attempts: self.max_attempts,
        })
    }
}
