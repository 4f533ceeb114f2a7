use super::outcome::Outcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Round lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Pending,
    Drawn,
}

impl RoundStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RoundStatus::Pending),
            "drawn" => Ok(RoundStatus::Drawn),
            _ => Err(format!("Invalid round status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Drawn => "drawn",
        }
    }
}

/// A round (issue) of the draw game
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Round {
    pub id: i64,
    pub lottery_code: String,
    pub round_code: String,
    /// Draw instant
    pub open_time: DateTime<Utc>,
    /// Betting cutoff, never after `open_time`
    pub close_time: DateTime<Utc>,
    pub status: String, // Stored as TEXT, use RoundStatus for type safety
    pub n1: Option<i16>,
    pub n2: Option<i16>,
    pub n3: Option<i16>,
    pub sum_value: Option<i16>,
    pub big_small: Option<String>,
    pub odd_even: Option<String>,
    pub extreme: Option<String>,
    pub raw_payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Round {
    pub fn status_enum(&self) -> RoundStatus {
        RoundStatus::from_str(&self.status).unwrap_or(RoundStatus::Pending)
    }

    pub fn is_drawn(&self) -> bool {
        self.status_enum() == RoundStatus::Drawn
    }

    /// Official outcome, if the round has been drawn
    pub fn outcome(&self) -> Option<Outcome> {
        if !self.is_drawn() {
            return None;
        }
        let to_u8 = |n: Option<i16>| n.and_then(|v| u8::try_from(v).ok());
        Outcome::from_numbers(to_u8(self.n1)?, to_u8(self.n2)?, to_u8(self.n3)?).ok()
    }

    /// Betting is open strictly before the close time
    pub fn accepts_bets_at(&self, now: DateTime<Utc>) -> bool {
        now < self.close_time
    }
}

/// Payload for upserting a drawn round
#[derive(Debug, Clone)]
pub struct DrawnRound {
    pub lottery_code: String,
    pub round_code: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub outcome: Outcome,
    pub raw_payload: String,
}

/// Payload for creating the pending row of an upcoming round
#[derive(Debug, Clone)]
pub struct PendingRound {
    pub lottery_code: String,
    pub round_code: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
}

impl Round {
    /// In-memory construction of a freshly drawn row
    pub fn from_drawn(id: i64, draw: &DrawnRound, now: DateTime<Utc>) -> Self {
        let [n1, n2, n3] = draw.outcome.numbers();
        Self {
            id,
            lottery_code: draw.lottery_code.clone(),
            round_code: draw.round_code.clone(),
            open_time: draw.open_time,
            close_time: draw.close_time,
            status: RoundStatus::Drawn.as_str().to_string(),
            n1: Some(n1 as i16),
            n2: Some(n2 as i16),
            n3: Some(n3 as i16),
            sum_value: Some(draw.outcome.sum() as i16),
            big_small: Some(draw.outcome.big_small().as_str().to_string()),
            odd_even: Some(draw.outcome.odd_even().as_str().to_string()),
            extreme: Some(draw.outcome.extreme().as_str().to_string()),
            raw_payload: Some(draw.raw_payload.clone()),
            created_at: now,
            updated_at: now,
        }
    }

    /// In-memory construction of a pending row
    pub fn from_pending(id: i64, pending: &PendingRound, now: DateTime<Utc>) -> Self {
        Self {
            id,
            lottery_code: pending.lottery_code.clone(),
            round_code: pending.round_code.clone(),
            open_time: pending.open_time,
            close_time: pending.close_time,
            status: RoundStatus::Pending.as_str().to_string(),
            n1: None,
            n2: None,
            n3: None,
            sum_value: None,
            big_small: None,
            odd_even: None,
            extreme: None,
            raw_payload: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite draw fields in place (corrective re-ingest)
    pub fn apply_draw(&mut self, draw: &DrawnRound, now: DateTime<Utc>) {
        let id = self.id;
        let created_at = self.created_at;
        *self = Self::from_drawn(id, draw, now);
        self.created_at = created_at;
    }
}
