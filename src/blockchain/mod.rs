// Blockchain module
//
// This module contains the core ledger implementation including:
// - Transaction structure and signing
// - Block structure and proof of work
// - Ledger orchestration and chain auditing
// - Cryptography utilities (secp256k1 ECDSA)

pub mod block;
pub mod chain;
pub mod crypto;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, Seal};
pub use chain::{Ledger, LedgerError};
pub use crypto::{Address, KeyPair};
pub use transaction::{Transaction, TransactionError};
