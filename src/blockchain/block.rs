use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Outcome of a bounded or interruptible proof-of-work search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningStatus {
    /// The hash satisfies the difficulty target
    Mined,
    /// The search stopped early; the block is consistent but not sealed
    NotYetMined,
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Hash of the previous block
    pub(crate) previous_hash: String,

    /// Creation time in Unix milliseconds
    pub(crate) timestamp: i64,

    /// List of transactions included in this block
    pub(crate) transactions: Vec<Transaction>,

    /// Proof of work counter
    pub(crate) nonce: u64,

    /// Hash of the current block (calculated)
    pub(crate) hash: String,
}

impl Block {
    /// Creates a new, unmined block with nonce 0
    pub fn new(timestamp: i64, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        let mut block = Block {
            previous_hash,
            timestamp,
            transactions,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// SHA-256 over previous hash, timestamp, the transactions and the nonce.
    /// Each transaction contributes its own digest and its signature, in
    /// list order.
    pub fn compute_hash(&self) -> String {
        let transactions = self
            .transactions
            .iter()
            .map(|tx| {
                let signature = tx.signature().map(|sig| sig.0.as_str()).unwrap_or_default();
                format!("{}.{}", tx.compute_hash(), signature)
            })
            .collect::<Vec<_>>()
            .join(",");
        let preimage = format!(
            "{}:{}:{}:{}",
            self.previous_hash, self.timestamp, transactions, self.nonce
        );

        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether the stored hash starts with `difficulty` zero hex digits
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.len() >= difficulty && self.hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// Searches nonces until the hash meets `difficulty`. Unbounded.
    pub fn mine(&mut self, difficulty: usize) {
        self.mine_until(difficulty, || false);
    }

    /// Searches nonces until the hash meets `difficulty` or `should_stop`
    /// returns true. The predicate is checked before every nonce increment.
    pub fn mine_until<F>(&mut self, difficulty: usize, mut should_stop: F) -> MiningStatus
    where
        F: FnMut() -> bool,
    {
        while !self.meets_difficulty(difficulty) {
            if should_stop() {
                debug!("Mining interrupted at nonce {}", self.nonce);
                return MiningStatus::NotYetMined;
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.compute_hash();
        }

        debug!("Block mined: {} (nonce {})", self.hash, self.nonce);
        MiningStatus::Mined
    }

    /// Tries at most `max_attempts` nonces; call again to resume.
    pub fn mine_batch(&mut self, difficulty: usize, max_attempts: u64) -> MiningStatus {
        let mut attempts = 0u64;
        self.mine_until(difficulty, || {
            let exhausted = attempts >= max_attempts;
            attempts += 1;
            exhausted
        })
    }

    /// Every transaction in the block verifies
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions.iter().all(|tx| match tx.is_valid() {
            Ok(valid) => valid,
            Err(err) => {
                warn!("Transaction {} failed verification: {}", tx.compute_hash(), err);
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::{Address, Wallet};

    fn sample_transactions() -> Vec<Transaction> {
        let sender = Wallet::new();
        let mut transfer = Transaction::new(sender.address().clone(), Address::from("bob"), 5.0);
        transfer.sign(&sender).unwrap();

        vec![transfer, Transaction::reward(Address::from("miner"), 100.0)]
    }

    #[test]
    fn test_new_block() {
        let block = Block::new(1_000, sample_transactions(), "previous_hash".to_string());

        assert_eq!(block.nonce(), 0);
        assert_eq!(block.previous_hash(), "previous_hash");
        assert_eq!(block.transactions().len(), 2);
        assert_eq!(block.hash(), block.compute_hash());
        assert_eq!(block.hash().len(), 64);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let transactions = sample_transactions();
        let a = Block::new(1_000, transactions.clone(), "prev".to_string());
        let b = Block::new(1_000, transactions, "prev".to_string());
        assert_eq!(a.hash(), b.hash());

        let mut c = a.clone();
        c.timestamp = 1_001;
        assert_ne!(a.compute_hash(), c.compute_hash());

        let mut d = a.clone();
        d.nonce = 7;
        assert_ne!(a.compute_hash(), d.compute_hash());
    }

    #[test]
    fn test_signature_is_part_of_the_hash() {
        let block = Block::new(1_000, sample_transactions(), "prev".to_string());
        let mut stripped = block.clone();
        stripped.transactions[0].signature = None;

        assert_ne!(block.compute_hash(), stripped.compute_hash());
    }

    #[test]
    fn test_every_transaction_field_is_part_of_the_hash() {
        let block = Block::new(1_000, sample_transactions(), "prev".to_string());
        let tampers: [fn(&mut Block); 5] = [
            |b: &mut Block| b.transactions[0].to_address = Address::from("carol"),
            |b: &mut Block| b.transactions[0].from_address = None,
            |b: &mut Block| b.transactions[0].amount += 1.0,
            |b: &mut Block| b.transactions[1].timestamp += 1,
            |b: &mut Block| b.transactions.swap(0, 1),
        ];

        for tamper in tampers {
            let mut changed = block.clone();
            tamper(&mut changed);
            assert_ne!(block.compute_hash(), changed.compute_hash());
        }
    }

    #[test]
    fn test_mining_produces_leading_zeros() {
        let mut block = Block::new(1_000, sample_transactions(), "prev".to_string());
        block.mine(2);

        assert!(block.hash().starts_with("00"));
        assert_eq!(block.hash(), block.compute_hash());
    }

    #[test]
    fn test_mine_until_stops_consistently() {
        let mut block = Block::new(1_000, sample_transactions(), "prev".to_string());

        // Difficulty 64 cannot be met in practice
        let mut budget = 10;
        let status = block.mine_until(64, || {
            budget -= 1;
            budget < 0
        });

        assert_eq!(status, MiningStatus::NotYetMined);
        assert_eq!(block.nonce(), 10);
        assert_eq!(block.hash(), block.compute_hash());
    }

    #[test]
    fn test_mine_batch_resumes() {
        let mut block = Block::new(1_000, sample_transactions(), "prev".to_string());

        let mut rounds = 0;
        while block.mine_batch(2, 16) == MiningStatus::NotYetMined {
            rounds += 1;
            assert!(block.nonce() <= 16 * rounds);
        }

        assert!(block.meets_difficulty(2));
        assert_eq!(block.hash(), block.compute_hash());
    }

    #[test]
    fn test_valid_transactions() {
        let block = Block::new(1_000, sample_transactions(), "prev".to_string());
        assert!(block.has_valid_transactions());
    }

    #[test]
    fn test_tampered_transaction_is_detected() {
        let mut block = Block::new(1_000, sample_transactions(), "prev".to_string());
        block.transactions[0].amount = 500.0;
        assert!(!block.has_valid_transactions());

        let mut unsigned = Block::new(1_000, sample_transactions(), "prev".to_string());
        unsigned.transactions[0].signature = None;
        assert!(!unsigned.has_valid_transactions());
    }
}
