//! A single-process proof-of-work ledger: signed transfers, mined blocks
//! and full-chain verification.

pub mod api;
pub mod blockchain;
pub mod config;

pub use blockchain::{Address, Block, Blockchain, BlockchainError, Transaction, Wallet};
pub use config::{AppConfig, LedgerConfig};
