//! Read projections published to the key-value cache.

use crate::models::Round;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The round currently open for betting, stored as a cache hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentRound {
    pub lottery_code: String,
    pub round_code: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub allow_bet: bool,
}

impl CurrentRound {
    pub fn from_round(round: &Round, now: DateTime<Utc>) -> Self {
        Self {
            lottery_code: round.lottery_code.clone(),
            round_code: round.round_code.clone(),
            open_time: round.open_time,
            close_time: round.close_time,
            allow_bet: round.accepts_bets_at(now),
        }
    }

    /// Recompute the betting flag against the stored close time
    pub fn refreshed(mut self, now: DateTime<Utc>) -> Self {
        self.allow_bet = now < self.close_time;
        self
    }

    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("lottery_code".to_string(), self.lottery_code.clone()),
            ("round_code".to_string(), self.round_code.clone()),
            ("open_time".to_string(), self.open_time.to_rfc3339()),
            ("close_time".to_string(), self.close_time.to_rfc3339()),
            (
                "allow_bet".to_string(),
                if self.allow_bet { "1" } else { "0" }.to_string(),
            ),
        ])
    }

    /// `None` when any field is missing or malformed
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        let time = |key: &str| {
            fields
                .get(key)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };

        Some(Self {
            lottery_code: fields.get("lottery_code")?.clone(),
            round_code: fields.get("round_code")?.clone(),
            open_time: time("open_time")?,
            close_time: time("close_time")?,
            allow_bet: fields.get("allow_bet")? == "1",
        })
    }
}

/// One entry of the recent-history list and the last-result value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawSummary {
    pub lottery_code: String,
    pub round_code: String,
    pub numbers: [u8; 3],
    pub sum: u8,
    pub big_small: String,
    pub odd_even: String,
    pub extreme: String,
    pub open_time: DateTime<Utc>,
}

impl DrawSummary {
    /// `None` for rounds that have not been drawn
    pub fn from_round(round: &Round) -> Option<Self> {
        let outcome = round.outcome()?;
        Some(Self {
            lottery_code: round.lottery_code.clone(),
            round_code: round.round_code.clone(),
            numbers: outcome.numbers(),
            sum: outcome.sum(),
            big_small: outcome.big_small().as_str().to_string(),
            odd_even: outcome.odd_even().as_str().to_string(),
            extreme: outcome.extreme().as_str().to_string(),
            open_time: round.open_time,
        })
    }

    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn current() -> CurrentRound {
        let open = Utc.with_ymd_and_hms(2025, 1, 1, 12, 3, 30).unwrap();
        CurrentRound {
            lottery_code: "jnd28".into(),
            round_code: "12346".into(),
            open_time: open,
            close_time: open - chrono::Duration::seconds(3),
            allow_bet: true,
        }
    }

    #[test]
    fn test_current_round_fields_round_trip() {
        let cur = current();
        assert_eq!(CurrentRound::from_fields(&cur.to_fields()), Some(cur));
    }

    #[test]
    fn test_corrupt_fields_are_rejected() {
        let mut fields = current().to_fields();
        fields.insert("close_time".into(), "not a time".into());
        assert_eq!(CurrentRound::from_fields(&fields), None);

        fields.remove("close_time");
        assert_eq!(CurrentRound::from_fields(&fields), None);
    }

    #[test]
    fn test_refresh_flips_at_close_time() {
        let cur = current();
        let close = cur.close_time;
        assert!(cur.clone().refreshed(close - chrono::Duration::milliseconds(1)).allow_bet);
        assert!(!cur.refreshed(close).allow_bet);
    }
}
