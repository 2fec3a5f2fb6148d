use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::crypto::{verify_signature, Address, CryptoError, KeyPair};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Cannot sign transactions for other wallets")]
    Authorization,

    #[error("No signature in this transaction")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// A signed intent to move value from one address to another.
///
/// A transaction with no sender is a mint (reward) transaction: it credits
/// newly created value and is always valid without a signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address, or `None` for a mint transaction
    pub from_address: Option<Address>,

    /// Recipient's address
    pub to_address: Address,

    /// Amount being transferred
    pub amount: u64,

    /// Timestamp when the transaction was created
    pub timestamp: DateTime<Utc>,

    /// Hex-encoded DER ECDSA signature over the transaction digest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    /// Creates a new unsigned transaction.
    ///
    /// The amount is not validated here; validation happens when the
    /// transaction is admitted to a ledger.
    pub fn new(from_address: Option<Address>, to_address: Address, amount: u64) -> Self {
        Transaction {
            from_address,
            to_address,
            amount,
            timestamp: Utc::now(),
            signature: None,
        }
    }

    /// Creates a new mint transaction crediting a mining reward.
    pub fn new_reward(to_address: Address, amount: u64) -> Self {
        Transaction::new(None, to_address, amount)
    }

    /// Computes the SHA-256 digest of this transaction.
    ///
    /// The preimage is the delimiter-free concatenation of sender, recipient,
    /// amount and epoch-millisecond timestamp, with an absent sender encoded
    /// as the empty string. Field boundaries are ambiguous between
    /// differing-length numeric fields; this encoding is deliberately kept
    /// as-is and must not change, or existing signatures break.
    pub fn digest(&self) -> [u8; 32] {
        let from = self.from_address.as_ref().map(|a| a.0.as_str()).unwrap_or("");

        let mut hasher = Sha256::new();
        hasher.update(from.as_bytes());
        hasher.update(self.to_address.0.as_bytes());
        hasher.update(self.amount.to_string().as_bytes());
        hasher.update(self.timestamp.timestamp_millis().to_string().as_bytes());
        hasher.finalize().into()
    }

    /// Returns the transaction digest as a hex string.
    pub fn calculate_hash(&self) -> String {
        hex::encode(self.digest())
    }

    /// Signs the transaction with the given key pair.
    ///
    /// Fails with [`TransactionError::Authorization`] if the key pair's
    /// public key does not match the sender's address; no signature is
    /// stored in that case.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), TransactionError> {
        let from = self.from_address.as_ref().ok_or(TransactionError::Authorization)?;
        if keypair.public_key_hex() != from.0 {
            return Err(TransactionError::Authorization);
        }

        let signature = keypair.sign_digest(&self.digest())?;
        self.signature = Some(hex::encode(signature));

        Ok(())
    }

    /// Checks whether the transaction's signature is valid.
    ///
    /// Mint transactions are always valid. A non-mint transaction without a
    /// signature is an error rather than merely invalid; with a signature,
    /// the verification outcome is returned as a boolean.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let from = match &self.from_address {
            Some(from) => from,
            None => return Ok(true),
        };

        let signature = match &self.signature {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        let signature_der = hex::decode(signature)
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        Ok(verify_signature(&self.digest(), &signature_der, &from.0)?)
    }

    /// Checks if this is a mint (reward) transaction.
    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }
}
