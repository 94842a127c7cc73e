use chrono::Utc;
use medchain_crypto::{sha256_hex, ZERO_HASH_HEX};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything that can be carried by a block.
///
/// `canonical_bytes` is the hash input for the payload and must be a pure
/// function of the value: two equal payloads always encode identically.
pub trait BlockPayload: Clone + fmt::Debug {
    fn canonical_bytes(&self) -> Vec<u8>;
}

/// A hash-linked block.
///
/// SAFETY INVARIANTS:
/// 1. `hash == compute_hash()` unless the block was tampered with
/// 2. Genesis (index 0) links to `ZERO_HASH_HEX`
/// 3. Blocks are never mutated once appended to a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block<P> {
    /// Block height in the chain
    pub(crate) index: u64,

    /// Creation time, microseconds since the Unix epoch
    pub(crate) timestamp: u64,

    /// Entity record or ledger transactions
    pub(crate) payload: P,

    /// Hash of the previous block (immutable link)
    pub(crate) previous_hash: String,

    /// Hash sealed at construction
    pub(crate) hash: String,
}

impl<P: BlockPayload> Block<P> {
    /// Create the genesis block for a chain.
    pub fn genesis(payload: P) -> Self {
        Self::new(0, fresh_timestamp(0), payload, ZERO_HASH_HEX.to_string())
    }

    pub(crate) fn new(index: u64, timestamp: u64, payload: P, previous_hash: String) -> Self {
        let mut block = Self {
            index,
            timestamp,
            payload,
            previous_hash,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Construct from raw fields (e.g. a received or archived chain); no
    /// validation performed, the stored hash is taken as given.
    pub fn from_raw(
        index: u64,
        timestamp: u64,
        payload: P,
        previous_hash: String,
        hash: String,
    ) -> Self {
        Self {
            index,
            timestamp,
            payload,
            previous_hash,
            hash,
        }
    }

    /// Re-derive the block hash with SHA-256.
    /// Layout: [index (8 LE)] [timestamp (8 LE)] [payload len (8 LE)] [payload] [previous_hash].
    pub fn compute_hash(&self) -> String {
        let payload = self.payload.canonical_bytes();
        let mut out = Vec::with_capacity(24 + payload.len() + self.previous_hash.len());
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(self.previous_hash.as_bytes());
        sha256_hex(&out)
    }

    /// True when the stored hash matches the block contents.
    pub fn is_sealed_correctly(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Current time in microseconds, forced strictly past `after` so that two
/// blocks appended within the same clock tick still order correctly.
pub(crate) fn fresh_timestamp(after: u64) -> u64 {
    let now = Utc::now().timestamp_micros().max(0) as u64;
    now.max(after.saturating_add(1))
}

/// Append a length-prefixed UTF-8 string to a canonical encoding.
pub(crate) fn put_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}
