//! minicoin - a minimal append-only ledger with proof-of-work sealing and
//! ECDSA-signed value transfers.
//!
//! The crate is purely in-process: callers submit signed [`Transaction`]s
//! to a [`Ledger`]'s pending pool, periodically mine them into a sealed
//! [`Block`], and query balances and chain integrity over the committed
//! chain. There is no networking, persistence, or multi-node consensus;
//! one thread owns the ledger and every operation runs to completion.

pub mod blockchain;

pub use blockchain::{Address, Block, KeyPair, Ledger, LedgerError, Seal, Transaction, TransactionError};
