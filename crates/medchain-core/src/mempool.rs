use crate::transaction::Transaction;
use std::collections::VecDeque;
use thiserror::Error;

pub const DEFAULT_POOL_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("pending pool at capacity ({capacity})")]
    PoolFull { capacity: usize },

    #[error("invalid fee {0}: fees must be finite and non-negative")]
    InvalidFee(f64),
}

/// FIFO queue of transactions waiting for the next sealing round.
#[derive(Debug, Clone)]
pub struct Mempool {
    pending: VecDeque<Transaction>,
    max_size: usize,
}

impl Mempool {
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            max_size,
        }
    }

    /// Queue a transaction. Content checks happen at seal time, only
    /// capacity and fee sanity are enforced here.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), SubmitError> {
        if self.pending.len() >= self.max_size {
            log::warn!(
                "Transaction pool at capacity ({}), rejecting transaction",
                self.max_size
            );
            return Err(SubmitError::PoolFull {
                capacity: self.max_size,
            });
        }

        let fee = transaction.fee();
        if !fee.is_finite() || fee < 0.0 {
            log::error!("Transaction validation failed: invalid fee {}", fee);
            return Err(SubmitError::InvalidFee(fee));
        }

        self.pending.push_back(transaction);
        log::debug!(
            "Transaction added to pool. Pool size: {}/{}",
            self.pending.len(),
            self.max_size
        );
        Ok(())
    }

    /// Take every pending transaction, oldest first.
    pub fn drain(&mut self) -> Vec<Transaction> {
        self.pending.drain(..).collect()
    }

    /// Put a drained batch back at the front, ahead of anything submitted
    /// since, keeping its original order.
    pub fn restore(&mut self, batch: Vec<Transaction>) {
        for transaction in batch.into_iter().rev() {
            self.pending.push_front(transaction);
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &Transaction> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
