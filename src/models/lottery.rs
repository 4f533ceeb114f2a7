use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lottery schedule configuration. Owned by admin tooling; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LotteryConfig {
    pub code: String,
    pub name: String,
    pub period_seconds: i32,
    pub lock_ahead_seconds: i32,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}

impl LotteryConfig {
    pub fn new(code: &str, name: &str, period_seconds: i32, lock_ahead_seconds: i32) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            period_seconds,
            lock_ahead_seconds,
            status: 1,
            created_at: Utc::now(),
        }
    }

    pub fn period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.period_seconds as i64)
    }

    pub fn lock_ahead(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_ahead_seconds as i64)
    }
}

/// One row of the house odds table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlayOdds {
    pub lottery_code: String,
    pub code: i32,
    /// Canonical selection name ("0".."27", "big", "extreme-small", ...)
    pub name: String,
    pub odds: Decimal, // NUMERIC(10, 4)
    pub status: i16,   // 1 = enabled
}

impl PlayOdds {
    pub fn is_enabled(&self) -> bool {
        self.status == 1
    }
}
