//! Parallel proof race between miners.
//!
//! Every miner runs the same bounded search on its own thread; nothing is
//! shared or cancelled. The fastest valid proof wins, ties go to the miner
//! listed first.

use crate::miner::Miner;
use crate::pow_engine::{ProofOfWork, ProofResult, SearchFailure};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceEntry {
    pub worker: usize,
    pub outcome: Result<ProofResult, SearchFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceWinner {
    pub worker: usize,
    pub proof: ProofResult,
}

/// Run every miner's search for `last_nonce` concurrently. Entries come back
/// in miner order.
pub fn run(pow: &ProofOfWork, miners: &[Miner], last_nonce: u64) -> Vec<RaceEntry> {
    miners
        .par_iter()
        .enumerate()
        .map(|(worker, miner)| RaceEntry {
            worker,
            outcome: miner.search(pow, last_nonce),
        })
        .collect()
}

/// Pick the minimum-duration entry whose proof passes `is_valid`.
pub fn select_winner(entries: &[RaceEntry], is_valid: impl Fn(u64) -> bool) -> Option<RaceWinner> {
    entries
        .iter()
        .filter_map(|entry| match &entry.outcome {
            Ok(proof) if is_valid(proof.nonce) => Some(RaceWinner {
                worker: entry.worker,
                proof: *proof,
            }),
            _ => None,
        })
        .min_by_key(|winner| (winner.proof.elapsed, winner.worker))
}

/// Why each entry failed to qualify: its search failure, or `Rejected` for a
/// proof that `is_valid` refuses.
pub fn failures(entries: Vec<RaceEntry>, is_valid: impl Fn(u64) -> bool) -> Vec<SearchFailure> {
    entries
        .into_iter()
        .filter_map(|entry| match entry.outcome {
            Ok(proof) if is_valid(proof.nonce) => None,
            Ok(proof) => Some(SearchFailure::Rejected { nonce: proof.nonce }),
            Err(failure) => Some(failure),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn found(worker: usize, nonce: u64, micros: u64) -> RaceEntry {
        RaceEntry {
            worker,
            outcome: Ok(ProofResult {
                nonce,
                attempts: nonce + 1,
                elapsed: Duration::from_micros(micros),
            }),
        }
    }

    #[test]
    fn test_fastest_worker_wins() {
        let entries = vec![found(0, 5, 300), found(1, 5, 100), found(2, 5, 200)];
        assert_eq!(select_winner(&entries, |_| true).map(|w| w.worker), Some(1));
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        let entries = vec![found(0, 5, 300), found(1, 5, 100), found(2, 5, 100)];
        assert_eq!(select_winner(&entries, |_| true).map(|w| w.worker), Some(1));
    }

    #[test]
    fn test_invalid_and_failed_entries_are_skipped() {
        let entries = vec![
            RaceEntry {
                worker: 0,
                outcome: Err(SearchFailure::Exhausted { attempts: 10 }),
            },
            found(1, 9, 10),
            found(2, 5, 50),
        ];
        let winner = select_winner(&entries, |nonce| nonce == 5).unwrap();
        assert_eq!(winner.worker, 2);
        assert_eq!(winner.proof.nonce, 5);
    }

    #[test]
    fn test_failures_count_rejected_proofs() {
        let entries = vec![
            RaceEntry {
                worker: 0,
                outcome: Err(SearchFailure::Exhausted { attempts: 10 }),
            },
            found(1, 9, 10),
            found(2, 5, 50),
        ];
        assert_eq!(
            failures(entries, |nonce| nonce == 5),
            vec![
                SearchFailure::Exhausted { attempts: 10 },
                SearchFailure::Rejected { nonce: 9 },
            ]
        );
    }

    #[test]
    fn test_every_miner_races_the_same_puzzle() {
        use medchain_core::Ledger;

        let ledger = Ledger::new();
        let miners: Vec<Miner> = (0..3).map(|i| Miner::new(format!("m{i}"), ledger.snapshot())).collect();
        let pow = ProofOfWork::new(&Default::default());

        let entries = run(&pow, &miners, 777);
        assert_eq!(entries.len(), 3);
        assert!(failures(entries, |nonce| pow.validate_proof(777, nonce)).is_empty());
    }

    #[test]
    fn test_no_valid_entry() {
        let entries = vec![RaceEntry {
            worker: 0,
            outcome: Err(SearchFailure::Exhausted { attempts: 1 }),
        }];
        assert!(select_winner(&entries, |_| true).is_none());
    }
}
