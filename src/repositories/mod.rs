//! Store contracts and their implementations.
//!
//! Every multi-row mutation (placement, cancellation, settlement, deposit)
//! is a single store call so it can run inside one transaction. Whenever an
//! order and a wallet are both locked, the order is locked first.

pub mod lottery_repository;
pub mod memory;
pub mod order_repository;
pub mod round_repository;
pub mod wallet_repository;

// Re-export all repositories for convenient access
pub use lottery_repository::LotteryRepository;
pub use memory::MemoryStore;
pub use order_repository::OrderRepository;
pub use round_repository::RoundRepository;
pub use wallet_repository::WalletRepository;

use crate::error::RepositoryError;
use crate::models::{
    DrawnRound, LedgerEntry, LotteryConfig, Order, OrderDraft, OrderItem, Outcome, PendingRound,
    PlayOdds, Round, SettleOutcome, User, WalletAccount,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Lottery schedule and house odds table
#[async_trait]
pub trait LotteryStore: Send + Sync {
    async fn lottery_config(&self, code: &str) -> RepoResult<Option<LotteryConfig>>;

    /// Insert the lottery if it does not exist; an existing row is returned untouched
    async fn ensure_lottery(&self, config: &LotteryConfig) -> RepoResult<LotteryConfig>;

    /// Enabled odds rows only
    async fn enabled_odds(&self, lottery_code: &str) -> RepoResult<Vec<PlayOdds>>;

    /// Every odds row, enabled or not
    async fn odds_table(&self, lottery_code: &str) -> RepoResult<Vec<PlayOdds>>;

    async fn upsert_odds(&self, odds: &PlayOdds) -> RepoResult<()>;
}

#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Insert or overwrite the round identified by (lottery, round code)
    async fn upsert_drawn_round(&self, draw: &DrawnRound) -> RepoResult<Round>;

    /// Insert a pending row unless the round already exists; returns the stored row
    async fn ensure_pending_round(&self, pending: &PendingRound) -> RepoResult<Round>;

    async fn find_round(&self, lottery_code: &str, round_code: &str) -> RepoResult<Option<Round>>;

    /// Drawn rounds, newest open time first
    async fn recent_drawn_rounds(&self, lottery_code: &str, limit: i64) -> RepoResult<Vec<Round>>;

    async fn latest_drawn_round(&self, lottery_code: &str) -> RepoResult<Option<Round>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_idempotency_key(&self, user_id: i64, key: &str) -> RepoResult<Option<Order>>;

    /// Atomically freeze the stake, write the order with its items and append
    /// the bet ledger entry. Fails with `Duplicate` on an idempotency key clash.
    async fn place_order(&self, draft: &OrderDraft) -> RepoResult<Order>;

    /// Cancel a `submitted` order and return its stake to available
    async fn cancel_order(&self, user_id: i64, order_id: i64) -> RepoResult<Order>;

    /// Settleable orders, oldest first
    async fn settlement_candidates(&self, limit: i64) -> RepoResult<Vec<Order>>;

    /// Settle one order against its outcome in its own transaction
    async fn settle_order(
        &self,
        order_id: i64,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> RepoResult<SettleOutcome>;

    async fn find_order(&self, order_id: i64) -> RepoResult<Option<Order>>;

    async fn order_items(&self, order_id: i64) -> RepoResult<Vec<OrderItem>>;

    /// Newest first
    async fn orders_for_user(&self, user_id: i64, limit: i64) -> RepoResult<Vec<Order>>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn create_user(&self, username: &str) -> RepoResult<User>;

    async fn find_user(&self, user_id: i64) -> RepoResult<Option<User>>;

    /// Get or create the user's wallet
    async fn ensure_account(&self, user_id: i64) -> RepoResult<WalletAccount>;

    async fn find_wallet(&self, user_id: i64) -> RepoResult<Option<WalletAccount>>;

    /// Credit available balance and append a deposit ledger entry
    async fn deposit(&self, user_id: i64, amount: Decimal, remark: Option<&str>) -> RepoResult<WalletAccount>;

    /// Newest first
    async fn ledger(&self, user_id: i64, limit: i64) -> RepoResult<Vec<LedgerEntry>>;
}

/// Why an order must be voided instead of settled, if at all
pub(crate) fn void_reason(user_exists: bool, has_wallet: bool, item_count: usize) -> Option<&'static str> {
    if !user_exists {
        Some("user not found")
    } else if !has_wallet {
        Some("wallet not found")
    } else if item_count == 0 {
        Some("order has no items")
    } else {
        None
    }
}
