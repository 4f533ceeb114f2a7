use crate::error::AppResult;
use crate::models::Outcome;
use crate::repositories::RoundStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves the official outcome of a round
#[async_trait]
pub trait OutcomeResolver: Send + Sync {
    /// `None` until the round has been drawn
    async fn resolve(&self, lottery_code: &str, round_code: &str) -> AppResult<Option<Outcome>>;
}

/// Reads outcomes straight from the round records
pub struct StoreOutcomeResolver {
    rounds: Arc<dyn RoundStore>,
}

impl StoreOutcomeResolver {
    pub fn new(rounds: Arc<dyn RoundStore>) -> Self {
        Self { rounds }
    }
}

#[async_trait]
impl OutcomeResolver for StoreOutcomeResolver {
    async fn resolve(&self, lottery_code: &str, round_code: &str) -> AppResult<Option<Outcome>> {
        let round = self.rounds.find_round(lottery_code, round_code).await?;
        Ok(round.and_then(|r| r.outcome()))
    }
}
