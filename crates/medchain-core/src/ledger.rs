//! The global transaction ledger: a `Chain<LedgerPayload>` plus the queue of
//! transactions waiting to be sealed into it.

use crate::block::{Block, BlockPayload};
use crate::chain::{Chain, ChainError, VerificationReport};
use crate::mempool::{Mempool, SubmitError};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const LEDGER_OWNER: &str = "ledger";

/// Nonce carried by the ledger genesis block; the first round mines on it.
pub const GENESIS_NONCE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPayload {
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
}

impl BlockPayload for LedgerPayload {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&(self.transactions.len() as u32).to_le_bytes());
        for transaction in &self.transactions {
            let bytes = transaction.canonical_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&bytes);
        }
        out
    }
}

pub type LedgerChain = Chain<LedgerPayload>;
pub type LedgerBlock = Block<LedgerPayload>;

#[derive(Debug)]
pub struct Ledger {
    chain: Arc<LedgerChain>,
    pending: Mempool,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_pool(Mempool::default())
    }

    pub fn with_pool(pending: Mempool) -> Self {
        let genesis = LedgerPayload {
            nonce: GENESIS_NONCE,
            transactions: Vec::new(),
        };
        Self {
            chain: Arc::new(Chain::new(LEDGER_OWNER, genesis)),
            pending,
        }
    }

    pub fn chain(&self) -> &LedgerChain {
        &self.chain
    }

    /// Shared read-only handle for miners.
    pub fn snapshot(&self) -> Arc<LedgerChain> {
        Arc::clone(&self.chain)
    }

    pub fn last_nonce(&self) -> u64 {
        self.chain
            .last_block()
            .map_or(GENESIS_NONCE, |block| block.payload().nonce)
    }

    /// Index of the block the next round will seal.
    pub fn next_index(&self) -> u64 {
        self.chain.len() as u64
    }

    /// Queue a transaction and return the index of the block expected to
    /// carry it.
    pub fn submit(&mut self, transaction: Transaction) -> Result<u64, SubmitError> {
        log::info!("submitted {}", transaction);
        self.pending.add_transaction(transaction)?;
        Ok(self.next_index())
    }

    pub fn pending(&self) -> &Mempool {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<Transaction> {
        self.pending.drain()
    }

    pub fn restore_pending(&mut self, batch: Vec<Transaction>) {
        if !batch.is_empty() {
            log::warn!("restoring {} transactions to the pending pool", batch.len());
        }
        self.pending.restore(batch);
    }

    pub fn verify(&self) -> VerificationReport {
        self.chain.verify()
    }

    /// Append a sealed block. Miners still holding the previous snapshot keep
    /// it untouched until they are handed the new one.
    pub fn seal(&mut self, nonce: u64, transactions: Vec<Transaction>) -> Result<LedgerBlock, ChainError> {
        let chain = Arc::make_mut(&mut self.chain);
        let block = chain.append(LedgerPayload { nonce, transactions })?;
        Ok(block.clone())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
