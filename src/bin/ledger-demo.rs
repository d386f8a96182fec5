//! Console walkthrough: mine a reward, send part of it, verify the chain.

use log::info;

use pow_ledger::blockchain::{Blockchain, Transaction, Wallet};
use pow_ledger::config::AppConfig;

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()?;
    let mut ledger = Blockchain::with_config(&config.ledger)?;

    // LEDGER_DEMO_KEY pins the miner's identity across runs
    let miner = match std::env::var("LEDGER_DEMO_KEY") {
        Ok(key) => Wallet::from_secret_key_hex(&key)?,
        Err(_) => Wallet::new(),
    };
    let recipient = Wallet::new();
    info!("Miner address: {}", miner.address());
    info!("Recipient address: {}", recipient.address());

    info!("Starting the miner...");
    ledger.mine_pending_transactions(miner.address());
    info!("Miner balance: {}", ledger.balance_of_address(miner.address()));

    let mut transfer = Transaction::new(miner.address().clone(), recipient.address().clone(), 10.0);
    transfer.sign(&miner)?;
    ledger.add_transaction(transfer)?;

    info!("Starting the miner again...");
    ledger.mine_pending_transactions(miner.address());

    info!("Miner balance: {}", ledger.balance_of_address(miner.address()));
    info!("Recipient balance: {}", ledger.balance_of_address(recipient.address()));
    info!(
        "Recipient history: {} transaction(s)",
        ledger.all_transactions_for_wallet(recipient.address()).len()
    );
    info!("Chain valid: {}", ledger.is_chain_valid());

    println!("{}", serde_json::to_string_pretty(ledger.chain())?);

    Ok(())
}
