use super::{LotteryStore, RepoResult};
use crate::models::{LotteryConfig, PlayOdds};
use async_trait::async_trait;
use sqlx::PgPool;

/// Repository for lottery configuration and the odds table
pub struct LotteryRepository {
    pool: PgPool,
}

impl LotteryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LotteryStore for LotteryRepository {
    async fn lottery_config(&self, code: &str) -> RepoResult<Option<LotteryConfig>> {
        let config = sqlx::query_as::<_, LotteryConfig>(
            r#"
            SELECT code, name, period_seconds, lock_ahead_seconds, status, created_at
            FROM lotteries
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    async fn ensure_lottery(&self, config: &LotteryConfig) -> RepoResult<LotteryConfig> {
        sqlx::query(
            r#"
            INSERT INTO lotteries (code, name, period_seconds, lock_ahead_seconds, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(&config.code)
        .bind(&config.name)
        .bind(config.period_seconds)
        .bind(config.lock_ahead_seconds)
        .bind(config.status)
        .execute(&self.pool)
        .await?;

        let stored = sqlx::query_as::<_, LotteryConfig>(
            r#"
            SELECT code, name, period_seconds, lock_ahead_seconds, status, created_at
            FROM lotteries
            WHERE code = $1
            "#,
        )
        .bind(&config.code)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn enabled_odds(&self, lottery_code: &str) -> RepoResult<Vec<PlayOdds>> {
        let odds = sqlx::query_as::<_, PlayOdds>(
            r#"
            SELECT lottery_code, code, name, odds, status
            FROM play_types
            WHERE lottery_code = $1 AND status = 1
            ORDER BY code
            "#,
        )
        .bind(lottery_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(odds)
    }

    async fn odds_table(&self, lottery_code: &str) -> RepoResult<Vec<PlayOdds>> {
        let odds = sqlx::query_as::<_, PlayOdds>(
            r#"
            SELECT lottery_code, code, name, odds, status
            FROM play_types
            WHERE lottery_code = $1
            ORDER BY code
            "#,
        )
        .bind(lottery_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(odds)
    }

    async fn upsert_odds(&self, odds: &PlayOdds) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO play_types (lottery_code, code, name, odds, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (lottery_code, name) DO UPDATE
            SET code = EXCLUDED.code, odds = EXCLUDED.odds, status = EXCLUDED.status
            "#,
        )
        .bind(&odds.lottery_code)
        .bind(odds.code)
        .bind(&odds.name)
        .bind(odds.odds)
        .bind(odds.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
