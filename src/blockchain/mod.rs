// Blockchain module
//
// This module contains the core ledger implementation:
// - Signature codec and wallets
// - Transaction structure
// - Block structure and proof of work
// - Blockchain (chain + pending pool)

pub mod block;
pub mod chain;
pub mod crypto;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, MiningStatus};
pub use chain::{Blockchain, BlockchainError};
pub use crypto::{Address, CryptoError, DigitalSignature, Wallet};
pub use transaction::{Transaction, TransactionError};
