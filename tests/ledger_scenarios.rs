//! Integration tests for the public ledger API

use std::sync::atomic::{AtomicBool, Ordering};

use pow_ledger::blockchain::{Address, Blockchain, BlockchainError, Transaction, TransactionError, Wallet};
use pow_ledger::LedgerConfig;

/// Helper to build and sign a transfer
fn transfer(sender: &Wallet, to: &Address, amount: f64) -> Result<Transaction, TransactionError> {
    let mut tx = Transaction::new(sender.address().clone(), to.clone(), amount);
    tx.sign(sender)?;
    Ok(tx)
}

#[test]
fn test_reward_then_transfer() -> Result<(), Box<dyn std::error::Error>> {
    let mut ledger = Blockchain::with_config(&LedgerConfig {
        difficulty: 2,
        mining_reward: 100.0,
        strict_pending_balance: false,
    })?;
    let sender = Wallet::new();
    let bob = Address::from("B");

    ledger.mine_pending_transactions(sender.address());
    assert_eq!(ledger.chain().len(), 2);
    assert_eq!(ledger.balance_of_address(sender.address()), 100.0);

    ledger.add_transaction(transfer(&sender, &bob, 50.0)?)?;

    let second_miner = Address::from("R");
    ledger.mine_pending_transactions(&second_miner);

    assert_eq!(ledger.chain().len(), 3);
    assert_eq!(ledger.balance_of_address(&bob), 50.0);
    assert_eq!(ledger.balance_of_address(sender.address()), 50.0);
    assert_eq!(ledger.balance_of_address(&second_miner), 100.0);
    assert!(ledger.is_chain_valid());

    for block in ledger.chain().iter().skip(1) {
        assert!(block.hash().starts_with("00"));
        assert_eq!(block.hash(), block.compute_hash());
        assert!(block.transactions().last().map_or(false, Transaction::is_reward));
    }

    Ok(())
}

#[test]
fn test_negative_amount_leaves_pool_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let mut ledger = Blockchain::new();
    let sender = Wallet::new();
    ledger.mine_pending_transactions(sender.address());

    let result = ledger.add_transaction(transfer(&sender, &Address::from("B"), -5.0)?);

    assert!(matches!(result, Err(BlockchainError::NonPositiveAmount(amount)) if amount == -5.0));
    assert!(ledger.pending_transactions().is_empty());

    Ok(())
}

#[test]
fn test_foreign_key_cannot_sign() {
    let owner = Wallet::new();
    let intruder = Wallet::new();
    let mut tx = Transaction::new(owner.address().clone(), Address::from("B"), 1.0);

    assert!(matches!(tx.sign(&intruder), Err(TransactionError::UnauthorizedSigner)));
    assert!(tx.signature().is_none());
}

#[test]
fn test_restored_wallet_signs_for_same_address() -> Result<(), Box<dyn std::error::Error>> {
    let original = Wallet::new();
    let restored = Wallet::from_secret_key_hex(&original.export_secret_key_hex())?;

    let tx = transfer(&restored, original.address(), 1.0)?;
    assert!(tx.is_valid()?);

    Ok(())
}

#[test]
fn test_cancelled_mining_can_be_retried() -> Result<(), Box<dyn std::error::Error>> {
    let mut ledger = Blockchain::new();
    let sender = Wallet::new();
    ledger.mine_pending_transactions(sender.address());
    ledger.add_transaction(transfer(&sender, &Address::from("B"), 25.0)?)?;

    let cancel = AtomicBool::new(true);
    let result = ledger.try_mine_pending_transactions(sender.address(), || cancel.load(Ordering::Relaxed));

    // Difficulty 2 may already be met by the first hash; either way the state is consistent
    match result {
        Err(BlockchainError::MiningCancelled) => {
            assert_eq!(ledger.chain().len(), 2);
            assert_eq!(ledger.pending_transactions().len(), 1);

            cancel.store(false, Ordering::Relaxed);
            ledger.try_mine_pending_transactions(sender.address(), || cancel.load(Ordering::Relaxed))?;
        }
        Ok(_) => {}
        Err(err) => return Err(err.into()),
    }

    assert_eq!(ledger.chain().len(), 3);
    assert!(ledger.pending_transactions().is_empty());
    assert_eq!(ledger.balance_of_address(&Address::from("B")), 25.0);
    assert!(ledger.is_chain_valid());

    Ok(())
}

#[test]
fn test_every_address_starts_at_zero() {
    let ledger = Blockchain::new();
    let wallet = Wallet::new();

    assert_eq!(ledger.balance_of_address(wallet.address()), 0.0);
    assert!(ledger.all_transactions_for_wallet(wallet.address()).is_empty());
    assert_eq!(ledger.chain()[0], Blockchain::create_genesis_block());
}
