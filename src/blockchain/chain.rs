use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use super::block::{Block, MiningStatus};
use super::crypto::Address;
use super::transaction::{Transaction, TransactionError};
use crate::config::{ConfigError, LedgerConfig};

/// 2017-01-01T00:00:00Z in Unix milliseconds
pub const GENESIS_TIMESTAMP: i64 = 1_483_228_800_000;

pub const DEFAULT_DIFFICULTY: usize = 2;

pub const DEFAULT_MINING_REWARD: f64 = 100.0;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction must include from and to address")]
    IncompleteTransaction,

    #[error("Cannot add invalid transaction to chain")]
    InvalidSignature,

    #[error("Transaction amount should be higher than 0, got {0}")]
    NonPositiveAmount(f64),

    #[error("Not enough balance: required {required}, available {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Mining was stopped before a valid hash was found")]
    MiningCancelled,

    #[error("Mined block no longer extends the chain: {0}")]
    StaleBlock(&'static str),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// The ledger: an append-only chain of blocks plus the pending pool
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, genesis first
    chain: Vec<Block>,

    /// Transactions waiting to be included in the next block
    pending_transactions: Vec<Transaction>,

    /// Required leading zero hex digits in a block hash
    difficulty: usize,

    /// Amount credited to the miner of each block
    mining_reward: f64,

    /// Count already-pending amounts when checking a sender's balance
    strict_pending_balance: bool,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block and default parameters
    pub fn new() -> Self {
        Self::from_config(&LedgerConfig::default())
    }

    /// Creates a blockchain with the given parameters after validating them
    pub fn with_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: &LedgerConfig) -> Self {
        Blockchain {
            chain: vec![Self::create_genesis_block()],
            pending_transactions: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            strict_pending_balance: config.strict_pending_balance,
        }
    }

    /// The fixed first block. Identical on every call.
    pub fn create_genesis_block() -> Block {
        Block::new(GENESIS_TIMESTAMP, Vec::new(), "0".to_string())
    }

    pub fn latest_block(&self) -> &Block {
        // `chain` always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    /// Validates a transaction and queues it for the next block.
    ///
    /// The balance check only looks at mined blocks unless strict pending
    /// accounting is enabled, so several queued transfers from one sender
    /// can jointly overdraw it.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), BlockchainError> {
        let from = match transaction.from_address() {
            Some(from) if !from.is_empty() && !transaction.to_address().is_empty() => from.clone(),
            _ => return Err(BlockchainError::IncompleteTransaction),
        };

        if !transaction.is_valid()? {
            warn!("Rejected transaction from {}: bad signature", from);
            return Err(BlockchainError::InvalidSignature);
        }

        // Written as a negation so that NaN is rejected too
        if !(transaction.amount() > 0.0) {
            return Err(BlockchainError::NonPositiveAmount(transaction.amount()));
        }

        let available = self.balance_of_address(&from);
        let required = if self.strict_pending_balance {
            self.pending_outflow(&from) + transaction.amount()
        } else {
            transaction.amount()
        };
        if available < required {
            warn!("Rejected transaction from {}: balance {} < {}", from, available, required);
            return Err(BlockchainError::InsufficientBalance { required, available });
        }

        debug!(
            "Queued transaction {} -> {} ({})",
            from,
            transaction.to_address(),
            transaction.amount()
        );
        self.pending_transactions.push(transaction);
        Ok(())
    }

    /// Mines every pending transaction plus a reward for `reward_address`
    /// into a new block and appends it. Runs until a hash is found.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> &Block {
        let mut block = self.next_block(reward_address);
        block.mine(self.difficulty);
        self.append(block)
    }

    /// Like [`Blockchain::mine_pending_transactions`], but gives up when
    /// `should_stop` returns true. An interrupted call leaves the chain and
    /// the pending pool untouched.
    pub fn try_mine_pending_transactions<F>(
        &mut self,
        reward_address: &Address,
        should_stop: F,
    ) -> Result<&Block, BlockchainError>
    where
        F: FnMut() -> bool,
    {
        let mut block = self.next_block(reward_address);
        match block.mine_until(self.difficulty, should_stop) {
            MiningStatus::Mined => self.commit_mined_block(block),
            MiningStatus::NotYetMined => {
                warn!("Mining for {} cancelled at nonce {}", reward_address, block.nonce());
                Err(BlockchainError::MiningCancelled)
            }
        }
    }

    /// Builds the unmined candidate block: a copy of the pending pool plus
    /// the reward for `reward_address`, linked to the latest block.
    ///
    /// Together with [`Blockchain::commit_mined_block`] this lets a caller
    /// run the proof-of-work search without holding on to the ledger.
    pub fn next_block(&self, reward_address: &Address) -> Block {
        let mut transactions = self.pending_transactions.clone();
        transactions.push(Transaction::reward(reward_address.clone(), self.mining_reward));

        Block::new(
            Utc::now().timestamp_millis(),
            transactions,
            self.latest_block().hash().to_string(),
        )
    }

    /// Appends a block mined from [`Blockchain::next_block`] and clears the
    /// pool. Fails without touching the ledger if the block is not sealed,
    /// the chain moved on, or the pending pool changed in the meantime.
    pub fn commit_mined_block(&mut self, block: Block) -> Result<&Block, BlockchainError> {
        if !block.meets_difficulty(self.difficulty) || block.hash() != block.compute_hash() {
            return Err(BlockchainError::StaleBlock("proof of work does not hold"));
        }
        if block.previous_hash() != self.latest_block().hash() {
            return Err(BlockchainError::StaleBlock("chain tip has changed"));
        }

        let (reward, mined) = match block.transactions().split_last() {
            Some(split) => split,
            None => return Err(BlockchainError::StaleBlock("reward transaction missing")),
        };
        if !reward.is_reward() || mined != self.pending_transactions.as_slice() {
            return Err(BlockchainError::StaleBlock("pending transactions have changed"));
        }

        Ok(self.append(block))
    }

    fn append(&mut self, block: Block) -> &Block {
        info!(
            "Block {} mined with {} transactions (nonce {})",
            block.hash(),
            block.transactions().len(),
            block.nonce()
        );
        self.chain.push(block);
        self.pending_transactions.clear();
        self.latest_block()
    }

    fn pending_outflow(&self, address: &Address) -> f64 {
        self.pending_transactions
            .iter()
            .filter(|tx| tx.from_address() == Some(address))
            .map(Transaction::amount)
            .sum()
    }

    /// Balance derived from every mined transaction, recomputed on each call
    pub fn balance_of_address(&self, address: &Address) -> f64 {
        let mut balance = 0.0;

        for block in &self.chain {
            for tx in block.transactions() {
                if tx.from_address() == Some(address) {
                    balance -= tx.amount();
                }
                if tx.to_address() == address {
                    balance += tx.amount();
                }
            }
        }

        balance
    }

    /// Every mined transaction sent or received by `address`, in chain order
    pub fn all_transactions_for_wallet(&self, address: &Address) -> Vec<&Transaction> {
        self.chain
            .iter()
            .flat_map(|block| block.transactions())
            .filter(|tx| tx.involves(address))
            .collect()
    }

    /// Checks the genesis block, hash linkage, stored hashes and signatures
    pub fn is_chain_valid(&self) -> bool {
        let genesis = Self::create_genesis_block();
        if self.chain.first() != Some(&genesis) {
            warn!("Chain validation failed: genesis block differs");
            return false;
        }

        for (index, pair) in self.chain.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let height = index + 1;

            if current.previous_hash() != previous.hash() {
                warn!("Chain validation failed: block {} is not linked to its parent", height);
                return false;
            }

            if !current.has_valid_transactions() {
                warn!("Chain validation failed: block {} holds invalid transactions", height);
                return false;
            }

            if current.hash() != current.compute_hash() {
                warn!("Chain validation failed: block {} hash mismatch", height);
                return false;
            }
        }

        true
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}
