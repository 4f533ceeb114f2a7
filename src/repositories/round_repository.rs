use super::{RepoResult, RoundStore};
use crate::models::{DrawnRound, PendingRound, Round, RoundStatus};
use async_trait::async_trait;
use sqlx::PgPool;

const ROUND_COLUMNS: &str = "id, lottery_code, round_code, open_time, close_time, status, \
     n1, n2, n3, sum_value, big_small, odd_even, extreme, raw_payload, created_at, updated_at";

/// Repository for draw rounds
pub struct RoundRepository {
    pool: PgPool,
}

impl RoundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoundStore for RoundRepository {
    async fn upsert_drawn_round(&self, draw: &DrawnRound) -> RepoResult<Round> {
        let [n1, n2, n3] = draw.outcome.numbers();
        let sql = format!(
            r#"
            INSERT INTO rounds
                (lottery_code, round_code, open_time, close_time, status,
                 n1, n2, n3, sum_value, big_small, odd_even, extreme, raw_payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (lottery_code, round_code) DO UPDATE
            SET open_time = EXCLUDED.open_time,
                close_time = EXCLUDED.close_time,
                status = EXCLUDED.status,
                n1 = EXCLUDED.n1,
                n2 = EXCLUDED.n2,
                n3 = EXCLUDED.n3,
                sum_value = EXCLUDED.sum_value,
                big_small = EXCLUDED.big_small,
                odd_even = EXCLUDED.odd_even,
                extreme = EXCLUDED.extreme,
                raw_payload = EXCLUDED.raw_payload,
                updated_at = NOW()
            RETURNING {}
            "#,
            ROUND_COLUMNS
        );

        let round = sqlx::query_as::<_, Round>(&sql)
            .bind(&draw.lottery_code)
            .bind(&draw.round_code)
            .bind(draw.open_time)
            .bind(draw.close_time)
            .bind(RoundStatus::Drawn.as_str())
            .bind(n1 as i16)
            .bind(n2 as i16)
            .bind(n3 as i16)
            .bind(draw.outcome.sum() as i16)
            .bind(draw.outcome.big_small().as_str())
            .bind(draw.outcome.odd_even().as_str())
            .bind(draw.outcome.extreme().as_str())
            .bind(&draw.raw_payload)
            .fetch_one(&self.pool)
            .await?;

        Ok(round)
    }

    async fn ensure_pending_round(&self, pending: &PendingRound) -> RepoResult<Round> {
        sqlx::query(
            r#"
            INSERT INTO rounds (lottery_code, round_code, open_time, close_time, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (lottery_code, round_code) DO NOTHING
            "#,
        )
        .bind(&pending.lottery_code)
        .bind(&pending.round_code)
        .bind(pending.open_time)
        .bind(pending.close_time)
        .bind(RoundStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM rounds WHERE lottery_code = $1 AND round_code = $2",
            ROUND_COLUMNS
        );
        let round = sqlx::query_as::<_, Round>(&sql)
            .bind(&pending.lottery_code)
            .bind(&pending.round_code)
            .fetch_one(&self.pool)
            .await?;

        Ok(round)
    }

    async fn find_round(&self, lottery_code: &str, round_code: &str) -> RepoResult<Option<Round>> {
        let sql = format!(
            "SELECT {} FROM rounds WHERE lottery_code = $1 AND round_code = $2",
            ROUND_COLUMNS
        );
        let round = sqlx::query_as::<_, Round>(&sql)
            .bind(lottery_code)
            .bind(round_code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(round)
    }

    async fn recent_drawn_rounds(&self, lottery_code: &str, limit: i64) -> RepoResult<Vec<Round>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM rounds
            WHERE lottery_code = $1 AND status = 'drawn'
            ORDER BY open_time DESC, id DESC
            LIMIT $2
            "#,
            ROUND_COLUMNS
        );
        let rounds = sqlx::query_as::<_, Round>(&sql)
            .bind(lottery_code)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rounds)
    }

    async fn latest_drawn_round(&self, lottery_code: &str) -> RepoResult<Option<Round>> {
        Ok(self.recent_drawn_rounds(lottery_code, 1).await?.into_iter().next())
    }
}
