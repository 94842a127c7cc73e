//! Fee settlement: the winner of a round collects every fee it sealed.

use medchain_core::Transaction;

/// Round half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Total reward for sealing `transactions`.
pub fn settle(transactions: &[Transaction], precision: u32) -> f64 {
    let total: f64 = transactions.iter().map(Transaction::fee).sum();
    round_to(total, precision)
}
