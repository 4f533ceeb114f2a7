#![allow(dead_code)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use sqlx::PgPool;
use sum28_backend::config::AppConfig;
use sum28_backend::database::run_migrations;
use sum28_backend::models::*;
use sum28_backend::repositories::*;
use sum28_backend::services::{bootstrap, PlaceOrderRequest, SelectionRequest};
use sum28_backend::AppState;

pub const LOTTERY: &str = "jnd28";

/// Codes for the named plays in the seeded odds table
const NAMED_ODDS: &[(&str, i32, i64)] = &[
    ("big", 100, 198),
    ("small", 101, 198),
    ("odd", 102, 198),
    ("even", 103, 198),
    ("extreme-big", 104, 1500),
    ("extreme-small", 105, 1500),
];

/// Application wired on the in-process store, with the default lottery and odds seeded
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub config: AppConfig,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    /// Orders stay `submitted` so they can be cancelled
    pub async fn manual_advance() -> Self {
        let mut config = AppConfig::default();
        config.orders.auto_advance = false;
        Self::with_config(config).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state =
            AppState::with_memory_store(store.clone(), &config).expect("Failed to build app state");
        seed(&state, &config).await;

        Self {
            store,
            state,
            config,
        }
    }

    /// Create a user with a wallet holding `cents`
    pub async fn funded_user(&self, username: &str, cents: i64) -> i64 {
        let user = self
            .state
            .wallets
            .create_user(username)
            .await
            .expect("Failed to create user");
        self.state
            .wallets
            .ensure_account(user.id)
            .await
            .expect("Failed to create wallet");
        if cents > 0 {
            self.state
                .wallets
                .deposit(user.id, money(cents), Some("test funding"))
                .await
                .expect("Failed to fund wallet");
        }
        user.id
    }

    /// Pending round whose betting closes `closes_in_secs` from now
    pub async fn open_round(&self, round_code: &str, closes_in_secs: i64) -> Round {
        let close_time = Utc::now() + Duration::seconds(closes_in_secs);
        self.state
            .rounds
            .ensure_pending_round(&PendingRound {
                lottery_code: LOTTERY.to_string(),
                round_code: round_code.to_string(),
                open_time: close_time + Duration::seconds(3),
                close_time,
            })
            .await
            .expect("Failed to open round")
    }

    /// Ingest a provider payload for `round_code` drawn now
    pub async fn draw(&self, round_code: &str, numbers: &str) -> Round {
        let payload = serde_json::json!({ "issue": round_code, "code": numbers });
        self.state
            .issues
            .ingest_draw(&payload)
            .await
            .expect("Ingest failed")
            .expect("Payload was skipped")
    }

    pub async fn wallet(&self, user_id: i64) -> WalletAccount {
        self.state
            .wallets
            .find_wallet(user_id)
            .await
            .expect("Failed to load wallet")
            .expect("Wallet missing")
    }

    pub async fn order(&self, order_id: i64) -> Order {
        self.state
            .orders
            .find_order(order_id)
            .await
            .expect("Failed to load order")
            .expect("Order missing")
    }
}

/// Application wired on PostgreSQL, for use with `#[sqlx::test]`
pub struct TestDatabase {
    pub pool: PgPool,
    pub state: AppState,
    pub config: AppConfig,
}

impl TestDatabase {
    pub async fn from_pool(pool: PgPool) -> Self {
        run_migrations(&pool, None)
            .await
            .expect("Failed to run migrations");

        let config = AppConfig::default();
        let state = AppState::postgres(pool.clone(), &config).expect("Failed to build app state");
        seed(&state, &config).await;

        Self {
            pool,
            state,
            config,
        }
    }

    pub async fn funded_user(&self, username: &str, cents: i64) -> i64 {
        let user = self
            .state
            .wallets
            .create_user(username)
            .await
            .expect("Failed to create user");
        self.state
            .wallets
            .ensure_account(user.id)
            .await
            .expect("Failed to create wallet");
        self.state
            .wallets
            .deposit(user.id, money(cents), None)
            .await
            .expect("Failed to fund wallet");
        user.id
    }

    pub async fn open_round(&self, round_code: &str, closes_in_secs: i64) -> Round {
        let close_time = Utc::now() + Duration::seconds(closes_in_secs);
        self.state
            .rounds
            .ensure_pending_round(&PendingRound {
                lottery_code: LOTTERY.to_string(),
                round_code: round_code.to_string(),
                open_time: close_time + Duration::seconds(3),
                close_time,
            })
            .await
            .expect("Failed to open round")
    }

    pub async fn wallet(&self, user_id: i64) -> WalletAccount {
        self.state
            .wallets
            .find_wallet(user_id)
            .await
            .expect("Failed to load wallet")
            .expect("Wallet missing")
    }
}

async fn seed(state: &AppState, config: &AppConfig) {
    bootstrap::ensure_default_lottery(state.lotteries.as_ref(), &config.lottery)
        .await
        .expect("Failed to seed lottery");
    seed_odds(state.lotteries.as_ref()).await;
}

/// Sums 0..=27 at 26.00 (sum 0 disabled), the named plays per `NAMED_ODDS`
pub async fn seed_odds(lotteries: &dyn LotteryStore) {
    for sum in 0..=27 {
        lotteries
            .upsert_odds(&PlayOdds {
                lottery_code: LOTTERY.to_string(),
                code: sum,
                name: sum.to_string(),
                odds: Decimal::new(2600, 2),
                status: if sum == 0 { 0 } else { 1 },
            })
            .await
            .expect("Failed to seed odds");
    }
    for (name, code, odds) in NAMED_ODDS {
        lotteries
            .upsert_odds(&PlayOdds {
                lottery_code: LOTTERY.to_string(),
                code: *code,
                name: name.to_string(),
                odds: Decimal::new(*odds, 2),
                status: 1,
            })
            .await
            .expect("Failed to seed odds");
    }
}

pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub fn pick(selection: &str, cents: i64) -> SelectionRequest {
    SelectionRequest {
        selection: selection.to_string(),
        stake: money(cents),
    }
}

pub fn order_request(user_id: i64, round_code: &str, picks: Vec<SelectionRequest>) -> PlaceOrderRequest {
    PlaceOrderRequest {
        user_id,
        lottery_code: LOTTERY.to_string(),
        round_code: round_code.to_string(),
        selections: picks,
        idempotency_key: None,
        channel: Some("test".to_string()),
        client_ip: Some("127.0.0.1".to_string()),
    }
}

pub fn keyed(mut request: PlaceOrderRequest, key: &str) -> PlaceOrderRequest {
    request.idempotency_key = Some(key.to_string());
    request
}
