//! Sum28 Backend Library
//!
//! Draw ingestion, betting window, order placement and settlement for the
//! sum-of-three-draws game. Exposed as a library for the binary and the tests.

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod repositories;
pub mod scheduler;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use cache::{KvCache, MemoryKv};
use database::Database;
use repositories::{
    LotteryRepository, LotteryStore, MemoryStore, OrderRepository, OrderStore, RoundRepository,
    RoundStore, WalletRepository, WalletStore,
};
use services::{IssueService, OrderService, SettlementEngine, StoreOutcomeResolver};
use std::sync::Arc;

/// Application state containing the stores and the services built on them
pub struct AppState {
    /// `None` when running on the in-process store
    pub database: Option<Database>,
    pub lotteries: Arc<dyn LotteryStore>,
    pub rounds: Arc<dyn RoundStore>,
    pub orders: Arc<dyn OrderStore>,
    pub wallets: Arc<dyn WalletStore>,
    pub cache: Arc<dyn KvCache>,
    pub issues: Arc<IssueService>,
    pub order_service: Arc<OrderService>,
    pub settlement: Arc<SettlementEngine>,
}

impl AppState {
    /// State backed by PostgreSQL
    pub fn postgres(pool: sqlx::PgPool, config: &AppConfig) -> AppResult<Self> {
        let database = Database::new(pool.clone());

        Self::assemble(
            Some(database),
            Arc::new(LotteryRepository::new(pool.clone())),
            Arc::new(RoundRepository::new(pool.clone())),
            Arc::new(OrderRepository::new(pool.clone())),
            Arc::new(WalletRepository::new(pool)),
            config,
        )
    }

    /// State backed by a caller-owned in-process store
    pub fn with_memory_store(store: Arc<MemoryStore>, config: &AppConfig) -> AppResult<Self> {
        Self::assemble(None, store.clone(), store.clone(), store.clone(), store, config)
    }

    fn assemble(
        database: Option<Database>,
        lotteries: Arc<dyn LotteryStore>,
        rounds: Arc<dyn RoundStore>,
        orders: Arc<dyn OrderStore>,
        wallets: Arc<dyn WalletStore>,
        config: &AppConfig,
    ) -> AppResult<Self> {
        let cache: Arc<dyn KvCache> = Arc::new(MemoryKv::new());

        let issues = Arc::new(IssueService::new(
            lotteries.clone(),
            rounds.clone(),
            cache.clone(),
            config,
        )?);
        let order_service = Arc::new(OrderService::new(
            lotteries.clone(),
            rounds.clone(),
            orders.clone(),
            config.orders.clone(),
        ));
        let resolver = Arc::new(StoreOutcomeResolver::new(rounds.clone()));
        let settlement = Arc::new(SettlementEngine::new(
            orders.clone(),
            resolver,
            config.settlement.batch_limit,
        ));

        Ok(Self {
            database,
            lotteries,
            rounds,
            orders,
            wallets,
            cache,
            issues,
            order_service,
            settlement,
        })
    }
}
