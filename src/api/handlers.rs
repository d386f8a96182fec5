use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Address, Block, Blockchain, BlockchainError, MiningStatus, Transaction, Wallet};

/// Shared server state: one ledger behind a lock
pub struct AppState {
    pub ledger: Mutex<Blockchain>,

    /// Deadline applied to every mining request
    pub mine_timeout: Duration,
}

impl AppState {
    pub fn new(ledger: Blockchain, mine_timeout: Duration) -> Self {
        AppState {
            ledger: Mutex::new(ledger),
            mine_timeout,
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, Blockchain>> {
        match self.ledger.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                error!("Ledger lock poisoned");
                None
            }
        }
    }
}

pub type AppData = web::Data<AppState>;

fn error_body(message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({ "error": message.into() })
}

fn poisoned() -> HttpResponse {
    HttpResponse::InternalServerError().json(error_body("Ledger state is unavailable"))
}

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's private key, hex encoded. The sender address is derived from it.
    pub private_key: String,

    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    pub amount: f64,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub message: String,

    /// The signed transaction now waiting in the pool
    pub transaction: Transaction,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// Address credited with the mining reward
    pub miner_address: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f64,
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(state: AppData) -> impl Responder {
    let ledger = match state.lock() {
        Some(ledger) => ledger,
        None => return poisoned(),
    };

    HttpResponse::Ok().json(ChainResponse {
        length: ledger.chain().len(),
        chain: ledger.chain().to_vec(),
        is_valid: ledger.is_chain_valid(),
    })
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(state: AppData) -> impl Responder {
    match state.lock() {
        Some(ledger) => HttpResponse::Ok().json(ledger.pending_transactions()),
        None => poisoned(),
    }
}

/// Create a new transaction
///
/// Signs a transfer with the given private key and adds it to the pending pool
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction queued", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn new_transaction(
    state: AppData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let wallet = match Wallet::from_secret_key_hex(&transaction_req.private_key) {
        Ok(wallet) => wallet,
        Err(err) => return HttpResponse::BadRequest().json(error_body(err.to_string())),
    };

    let mut transaction = Transaction::new(
        wallet.address().clone(),
        Address(transaction_req.recipient.trim().to_string()),
        transaction_req.amount,
    );

    if let Err(err) = transaction.sign(&wallet) {
        return HttpResponse::BadRequest().json(error_body(format!("Failed to sign transaction: {}", err)));
    }

    let mut ledger = match state.lock() {
        Some(ledger) => ledger,
        None => return poisoned(),
    };

    match ledger.add_transaction(transaction.clone()) {
        Ok(()) => HttpResponse::Created().json(TransactionResponse {
            message: "Transaction will be added to the next block".to_string(),
            transaction,
        }),
        Err(err) => HttpResponse::BadRequest().json(error_body(format!("Failed to add transaction: {}", err))),
    }
}

/// Mine a new block
///
/// Creates a new block with all pending transactions plus the mining reward
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Invalid mining request"),
        (status = 408, description = "Mining did not finish before the deadline"),
        (status = 409, description = "The chain or pending pool changed while mining"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(state: AppData, mine_req: web::Json<MineRequest>) -> impl Responder {
    let miner_address = Address(mine_req.miner_address.trim().to_string());
    if miner_address.is_empty() {
        return HttpResponse::BadRequest().json(error_body("Miner address must not be empty"));
    }

    // Proof of work is CPU bound; keep it off the async workers. The ledger
    // lock is only held to build the candidate and to commit it.
    let result = web::block(move || {
        let (mut block, difficulty) = {
            let ledger = state.lock()?;
            (ledger.next_block(&miner_address), ledger.difficulty())
        };

        let deadline = Instant::now() + state.mine_timeout;
        if block.mine_until(difficulty, || Instant::now() >= deadline) == MiningStatus::NotYetMined {
            return Some(Err(BlockchainError::MiningCancelled));
        }

        let mut ledger = state.lock()?;
        let committed = ledger.commit_mined_block(block).map(Block::clone);
        Some(committed)
    })
    .await;

    match result {
        Ok(Some(Ok(block))) => {
            info!("Mined block {} via API", block.hash());
            HttpResponse::Ok().json(MineResponse {
                message: "New Block Mined".to_string(),
                block,
            })
        }
        Ok(Some(Err(BlockchainError::MiningCancelled))) => HttpResponse::RequestTimeout()
            .json(error_body("Mining did not finish before the deadline")),
        Ok(Some(Err(err @ BlockchainError::StaleBlock(_)))) => {
            HttpResponse::Conflict().json(error_body(format!("Failed to mine block: {}", err)))
        }
        Ok(Some(Err(err))) => {
            HttpResponse::BadRequest().json(error_body(format!("Failed to mine block: {}", err)))
        }
        Ok(None) => poisoned(),
        Err(err) => {
            error!("Mining task failed: {}", err);
            HttpResponse::InternalServerError().json(error_body("Mining task failed"))
        }
    }
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(state: AppData) -> impl Responder {
    match state.lock() {
        Some(ledger) => HttpResponse::Ok().json(ledger.is_chain_valid()),
        None => poisoned(),
    }
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair.
/// The private key is not stored by the server.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let wallet = Wallet::new();

    HttpResponse::Created().json(WalletResponse {
        address: wallet.address().to_string(),
        private_key: wallet.export_secret_key_hex(),
    })
}

/// Get wallet balance
///
/// Returns the balance of a wallet, derived from the mined chain
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{address}/balance",
    params(
        ("address" = String, Path, description = "Wallet address")
    ),
    responses(
        (status = 200, description = "Wallet balance retrieved successfully", body = BalanceResponse)
    )
)]
pub async fn get_wallet_balance(state: AppData, address: web::Path<String>) -> impl Responder {
    let address = Address(address.into_inner());
    let ledger = match state.lock() {
        Some(ledger) => ledger,
        None => return poisoned(),
    };

    HttpResponse::Ok().json(BalanceResponse {
        balance: ledger.balance_of_address(&address),
        address: address.0,
    })
}

/// Get wallet history
///
/// Returns every mined transaction sent or received by the wallet
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{address}/transactions",
    params(
        ("address" = String, Path, description = "Wallet address")
    ),
    responses(
        (status = 200, description = "Wallet transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_wallet_transactions(state: AppData, address: web::Path<String>) -> impl Responder {
    let address = Address(address.into_inner());
    match state.lock() {
        Some(ledger) => HttpResponse::Ok().json(ledger.all_transactions_for_wallet(&address)),
        None => poisoned(),
    }
}
