use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{self, Address, CryptoError, DigitalSignature, Wallet};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Signing key does not belong to the sender address")]
    UnauthorizedSigner,

    #[error("No signature in this transaction")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// A signed value transfer between two addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address, absent for mining rewards
    pub(crate) from_address: Option<Address>,

    /// Recipient's address
    pub(crate) to_address: Address,

    /// Amount being transferred
    pub(crate) amount: f64,

    /// Creation time in Unix milliseconds
    pub(crate) timestamp: i64,

    /// Hex signature over the transaction digest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transfer
    pub fn new(from_address: Address, to_address: Address, amount: f64) -> Self {
        Transaction {
            from_address: Some(from_address),
            to_address,
            amount,
            timestamp: Utc::now().timestamp_millis(),
            signature: None,
        }
    }

    /// Creates a mining reward paid to `to_address`
    pub fn reward(to_address: Address, amount: f64) -> Self {
        Transaction {
            from_address: None,
            to_address,
            amount,
            timestamp: Utc::now().timestamp_millis(),
            signature: None,
        }
    }

    pub fn from_address(&self) -> Option<&Address> {
        self.from_address.as_ref()
    }

    pub fn to_address(&self) -> &Address {
        &self.to_address
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn signature(&self) -> Option<&DigitalSignature> {
        self.signature.as_ref()
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// Involves `address` as sender or recipient
    pub fn involves(&self, address: &Address) -> bool {
        self.from_address.as_ref() == Some(address) || &self.to_address == address
    }

    /// SHA-256 of sender, recipient, amount and timestamp, hex encoded.
    /// The signature is not part of the digest.
    pub fn compute_hash(&self) -> String {
        let from = self.from_address.as_ref().map(Address::as_str).unwrap_or_default();
        let preimage = format!(
            "{}:{}:{}:{}",
            from, self.to_address, self.amount, self.timestamp
        );

        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Signs the transaction with the sender's wallet
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), TransactionError> {
        if self.from_address.as_ref() != Some(wallet.address()) {
            return Err(TransactionError::UnauthorizedSigner);
        }

        self.signature = Some(crypto::sign(wallet, &self.compute_hash()));
        Ok(())
    }

    /// Verifies the signature against the sender address.
    ///
    /// Mining rewards carry no sender and are always valid.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let from = match &self.from_address {
            Some(from) => from,
            None => return Ok(true),
        };

        let signature = match &self.signature {
            Some(sig) if !sig.0.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        Ok(crypto::verify(from.as_str(), &self.compute_hash(), &signature.0)?)
    }
}
