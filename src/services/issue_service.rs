//! Round lifecycle: draw ingestion, the betting window and read projections.

use super::draw_payload::parse_draw_payload;
use super::projection::{CurrentRound, DrawSummary};
use crate::cache::{keys, KvCache};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{DrawnRound, LotteryConfig, PendingRound, Round};
use crate::repositories::{LotteryStore, RoundStore};
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Numeric round codes advance by one; anything else is reused as is
pub fn next_round_code(round_code: &str) -> String {
    if !round_code.is_empty() && round_code.chars().all(|c| c.is_ascii_digit()) {
        if let Some(next) = round_code.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
            return next.to_string();
        }
    }
    round_code.to_string()
}

/// Open and close times of the round after `drawn`
pub fn next_round(lottery: &LotteryConfig, drawn: &Round) -> PendingRound {
    let open_time = drawn.open_time + lottery.period();
    PendingRound {
        lottery_code: drawn.lottery_code.clone(),
        round_code: next_round_code(&drawn.round_code),
        open_time,
        close_time: open_time - lottery.lock_ahead(),
    }
}

pub struct IssueService {
    lotteries: Arc<dyn LotteryStore>,
    rounds: Arc<dyn RoundStore>,
    cache: Arc<dyn KvCache>,
    /// Used when the lottery row is missing from the store
    fallback_lottery: LotteryConfig,
    source_offset: FixedOffset,
    history_cap: usize,
    current_round_ttl: Duration,
}

impl IssueService {
    pub fn new(
        lotteries: Arc<dyn LotteryStore>,
        rounds: Arc<dyn RoundStore>,
        cache: Arc<dyn KvCache>,
        config: &AppConfig,
    ) -> AppResult<Self> {
        let source_offset = FixedOffset::east_opt(config.collector.source_utc_offset_seconds)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Invalid draw source UTC offset: {}",
                    config.collector.source_utc_offset_seconds
                ))
            })?;

        let defaults = &config.lottery;
        Ok(Self {
            lotteries,
            rounds,
            cache,
            fallback_lottery: LotteryConfig::new(
                &defaults.code,
                &defaults.name,
                defaults.period_seconds,
                defaults.lock_ahead_seconds,
            ),
            source_offset,
            history_cap: config.cache.history_cap,
            current_round_ttl: config.cache.current_round_ttl(),
        })
    }

    pub fn lottery_code(&self) -> &str {
        &self.fallback_lottery.code
    }

    /// Schedule of the managed lottery
    pub async fn lottery(&self) -> AppResult<LotteryConfig> {
        Ok(self
            .lotteries
            .lottery_config(self.lottery_code())
            .await?
            .unwrap_or_else(|| self.fallback_lottery.clone()))
    }

    /// Ingest one provider payload.
    ///
    /// Unusable payloads are logged and skipped with `Ok(None)`; storage and
    /// cache failures propagate to the caller.
    pub async fn ingest_draw(&self, payload: &Value) -> AppResult<Option<Round>> {
        self.ingest_draw_at(payload, Utc::now()).await
    }

    pub async fn ingest_draw_at(&self, payload: &Value, now: DateTime<Utc>) -> AppResult<Option<Round>> {
        let parsed = match parse_draw_payload(payload, self.source_offset) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping draw payload: {}", e);
                return Ok(None);
            }
        };

        let lottery = self.lottery().await?;
        let open_time = parsed.draw_time.unwrap_or(now);
        let draw = DrawnRound {
            lottery_code: lottery.code.clone(),
            round_code: parsed.round_code,
            open_time,
            close_time: open_time - lottery.lock_ahead(),
            outcome: parsed.outcome,
            raw_payload: parsed.raw_payload,
        };

        let round = self.rounds.upsert_drawn_round(&draw).await?;
        info!(
            "Round {}/{} drawn: {}",
            round.lottery_code, round.round_code, draw.outcome
        );

        if let Some(summary) = DrawSummary::from_round(&round) {
            self.push_history(&summary).await?;
        }

        let upcoming = self.rounds.ensure_pending_round(&next_round(&lottery, &round)).await?;
        let current = CurrentRound::from_round(&upcoming, now);
        debug!(
            "Current round {} closes at {} (betting {})",
            current.round_code,
            current.close_time,
            if current.allow_bet { "open" } else { "closed" }
        );
        self.publish_current(&current).await?;

        Ok(Some(round))
    }

    /// Recompute the betting flag of the published current round.
    ///
    /// Returns the new flag, or `None` when there is no usable projection.
    pub async fn refresh_betting_window(&self) -> AppResult<Option<bool>> {
        self.refresh_betting_window_at(Utc::now()).await
    }

    pub async fn refresh_betting_window_at(&self, now: DateTime<Utc>) -> AppResult<Option<bool>> {
        let fields = self
            .cache
            .hgetall(&keys::current_round(self.lottery_code()))
            .await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let current = match CurrentRound::from_fields(&fields) {
            Some(current) => current.refreshed(now),
            None => {
                debug!("Current round projection unreadable, waiting for next ingest");
                return Ok(None);
            }
        };

        self.publish_current(&current).await?;
        Ok(Some(current.allow_bet))
    }

    /// Current round from the cache, else the newest drawn round with betting closed
    pub async fn current_round(&self) -> AppResult<Option<CurrentRound>> {
        let fields = self
            .cache
            .hgetall(&keys::current_round(self.lottery_code()))
            .await?;
        if let Some(current) = CurrentRound::from_fields(&fields) {
            return Ok(Some(current));
        }

        let latest = self.rounds.latest_drawn_round(self.lottery_code()).await?;
        Ok(latest.map(|round| CurrentRound {
            allow_bet: false,
            ..CurrentRound::from_round(&round, Utc::now())
        }))
    }

    pub async fn last_result(&self) -> AppResult<Option<DrawSummary>> {
        let cached = self.cache.get(&keys::last_result(self.lottery_code())).await?;
        if let Some(summary) = cached.as_deref().and_then(DrawSummary::decode) {
            return Ok(Some(summary));
        }

        let latest = self.rounds.latest_drawn_round(self.lottery_code()).await?;
        Ok(latest.as_ref().and_then(DrawSummary::from_round))
    }

    /// Most recent draws, newest first; unreadable cache entries are skipped
    pub async fn history(&self, limit: usize) -> AppResult<Vec<DrawSummary>> {
        let limit = limit.clamp(1, self.history_cap);
        let cached = self
            .cache
            .lrange(&keys::history(self.lottery_code()), 0, limit - 1)
            .await?;

        if !cached.is_empty() {
            return Ok(cached.iter().filter_map(|raw| DrawSummary::decode(raw)).collect());
        }

        let rounds = self
            .rounds
            .recent_drawn_rounds(self.lottery_code(), limit as i64)
            .await?;
        Ok(rounds.iter().filter_map(DrawSummary::from_round).collect())
    }

    /// Rebuild history and last result from the newest drawn rounds
    pub async fn warm_up(&self) -> AppResult<usize> {
        let rounds = self
            .rounds
            .recent_drawn_rounds(self.lottery_code(), self.history_cap as i64)
            .await?;

        self.cache.del(&keys::history(self.lottery_code())).await?;

        let mut loaded = 0;
        for round in rounds.iter().rev() {
            if let Some(summary) = DrawSummary::from_round(round) {
                self.push_history(&summary).await?;
                loaded += 1;
            }
        }

        info!("Warmed history projection with {} rounds", loaded);
        Ok(loaded)
    }

    async fn push_history(&self, summary: &DrawSummary) -> AppResult<()> {
        let key = keys::history(&summary.lottery_code);
        let encoded = serde_json::to_string(summary)?;

        let existing = self.cache.lrange(&key, 0, self.history_cap - 1).await?;
        for raw in existing {
            let same_round = DrawSummary::decode(&raw)
                .map_or(false, |entry| entry.round_code == summary.round_code);
            if same_round {
                self.cache.lrem(&key, &raw).await?;
            }
        }

        self.cache.lpush(&key, encoded.clone()).await?;
        self.cache.ltrim(&key, 0, self.history_cap - 1).await?;
        self.cache
            .set(&keys::last_result(&summary.lottery_code), encoded)
            .await?;

        Ok(())
    }

    async fn publish_current(&self, current: &CurrentRound) -> AppResult<()> {
        let key = keys::current_round(&current.lottery_code);
        self.cache.hset_all(&key, current.to_fields()).await?;
        self.cache.expire(&key, self.current_round_ttl).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_round_code() {
        assert_eq!(next_round_code("12345"), "12346");
        assert_eq!(next_round_code("0099"), "100");
        assert_eq!(next_round_code("A-17"), "A-17");
        assert_eq!(next_round_code(""), "");
        assert_eq!(next_round_code("99999999999999999999999"), "99999999999999999999999");
    }
}
