use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::sync::atomic::{AtomicBool, Ordering};

use super::transaction::{Transaction, TransactionError};

/// The mining state of a block.
///
/// Sealing is a single, total transition: a block starts `Unsealed` with its
/// hash computed once at nonce 0, and `mine` moves it to `Sealed` when the
/// proof-of-work condition holds. There is no reverse transition, and a
/// sealed block is never mutated again by a correctly-operating caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Seal {
    Unsealed { nonce: u64, provisional_hash: String },
    Sealed { nonce: u64, hash: String },
}

/// An ordered batch of transactions plus a proof-of-work seal linking it to
/// its predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Timestamp when the block was created
    pub timestamp: DateTime<Utc>,

    /// List of transactions included in this block; order participates in
    /// the hash digest
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block, or "0" for the genesis block
    pub previous_hash: String,

    /// Mining state, carrying the nonce and current hash
    pub seal: Seal,
}

impl Block {
    /// Creates a new unsealed block with its hash computed at nonce 0.
    pub fn new(
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let mut block = Block {
            timestamp,
            transactions,
            previous_hash,
            seal: Seal::Unsealed {
                nonce: 0,
                provisional_hash: String::new(),
            },
        };

        block.seal = Seal::Unsealed {
            nonce: 0,
            provisional_hash: block.hash_with_nonce(0),
        };

        block
    }

    /// Returns the current nonce, sealed or not.
    pub fn nonce(&self) -> u64 {
        match &self.seal {
            Seal::Unsealed { nonce, .. } | Seal::Sealed { nonce, .. } => *nonce,
        }
    }

    /// Returns the stored hash, sealed or not.
    pub fn hash(&self) -> &str {
        match &self.seal {
            Seal::Unsealed { provisional_hash, .. } => provisional_hash,
            Seal::Sealed { hash, .. } => hash,
        }
    }

    /// Calculates the hash of the block at its current nonce.
    ///
    /// The preimage is the delimiter-free concatenation of the previous
    /// hash, the epoch-millisecond timestamp, the JSON serialization of the
    /// transaction list, and the nonce. The same computation is used at
    /// construction, during mining, and during chain audits.
    pub fn calculate_hash(&self) -> String {
        self.hash_with_nonce(self.nonce())
    }

    fn hash_with_nonce(&self, nonce: u64) -> String {
        let transactions = serde_json::to_string(&self.transactions).unwrap();

        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.timestamp.timestamp_millis().to_string().as_bytes());
        hasher.update(transactions.as_bytes());
        hasher.update(nonce.to_string().as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Mines the block: increments the nonce and recomputes the hash until
    /// the first `difficulty` hex characters are all '0', then seals.
    ///
    /// This is a blocking, single-threaded search with no iteration bound
    /// and no timeout.
    pub fn mine(&mut self, difficulty: usize) {
        let target = "0".repeat(difficulty);
        let mut nonce = self.nonce();
        let mut hash = self.hash_with_nonce(nonce);

        while !hash.starts_with(&target) {
            nonce += 1;
            hash = self.hash_with_nonce(nonce);
        }

        info!("Block mined: {}", hash);
        self.seal = Seal::Sealed { nonce, hash };
    }

    /// Mines the block, checking a stop flag between nonce attempts.
    ///
    /// Returns `true` if the block was sealed, `false` if the search was
    /// stopped first (the block stays unsealed at its latest nonce). The
    /// default [`Block::mine`] is unaffected by this capability.
    pub fn mine_cancellable(&mut self, difficulty: usize, stop: &AtomicBool) -> bool {
        let target = "0".repeat(difficulty);
        let mut nonce = self.nonce();
        let mut hash = self.hash_with_nonce(nonce);

        while !hash.starts_with(&target) {
            if stop.load(Ordering::Relaxed) {
                self.seal = Seal::Unsealed {
                    nonce,
                    provisional_hash: hash,
                };
                return false;
            }
            nonce += 1;
            hash = self.hash_with_nonce(nonce);
        }

        info!("Block mined: {}", hash);
        self.seal = Seal::Sealed { nonce, hash };
        true
    }

    /// Checks every contained transaction, returning false on the first
    /// invalid one.
    ///
    /// Errors raised by a transaction (such as a missing signature) are
    /// propagated rather than converted to `false`.
    pub fn has_valid_transactions(&self) -> Result<bool, TransactionError> {
        for transaction in &self.transactions {
            if !transaction.is_valid()? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
