use crate::fee::round_to;
use crate::pow_engine::{ProofOfWork, ProofResult, SearchFailure};
use medchain_core::LedgerChain;
use std::sync::Arc;

/// A proof-of-work worker. Holds a read-only snapshot of the ledger that the
/// engine replaces after every round.
#[derive(Debug, Clone)]
pub struct Miner {
    id: String,
    wallet: f64,
    chain: Arc<LedgerChain>,
}

impl Miner {
    pub fn new(id: impl Into<String>, chain: Arc<LedgerChain>) -> Self {
        Self {
            id: id.into(),
            wallet: 0.0,
            chain,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fees collected so far.
    pub fn wallet(&self) -> f64 {
        self.wallet
    }

    pub fn chain(&self) -> &LedgerChain {
        &self.chain
    }

    /// Nonce of the tail block in this miner's snapshot.
    pub fn tail_nonce(&self) -> Option<u64> {
        self.chain.last_block().map(|block| block.payload().nonce)
    }

    /// Search a proof for the round's puzzle. Every miner in a race gets the
    /// same `last_nonce`, whatever its snapshot says.
    pub fn search(&self, pow: &ProofOfWork, last_nonce: u64) -> Result<ProofResult, SearchFailure> {
        pow.search(last_nonce)
    }

    pub(crate) fn credit(&mut self, amount: f64, precision: u32) {
        self.wallet = round_to(self.wallet + amount, precision);
    }

    pub(crate) fn receive_chain(&mut self, chain: Arc<LedgerChain>) {
        self.chain = chain;
    }
}
