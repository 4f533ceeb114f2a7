use super::money::{max_amount, q2};
use super::outcome::Outcome;
use super::selection::Selection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Submitted,
    Cancelled,
    AwaitingSettlement,
    Paid,
    Lost,
    Void,
}

impl OrderStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "submitted" => Ok(OrderStatus::Submitted),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "awaiting_settlement" => Ok(OrderStatus::AwaitingSettlement),
            "paid" => Ok(OrderStatus::Paid),
            "lost" => Ok(OrderStatus::Lost),
            "void" => Ok(OrderStatus::Void),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Submitted => "submitted",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::AwaitingSettlement => "awaiting_settlement",
            OrderStatus::Paid => "paid",
            OrderStatus::Lost => "lost",
            OrderStatus::Void => "void",
        }
    }

    /// Statuses the settlement engine picks up
    pub const SETTLEABLE: [OrderStatus; 2] =
        [OrderStatus::Submitted, OrderStatus::AwaitingSettlement];

    pub fn is_settleable(&self) -> bool {
        Self::SETTLEABLE.contains(self)
    }
}

/// Line item result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemResult {
    Pending,
    Hit,
    Miss,
    Voided,
}

impl ItemResult {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ItemResult::Pending),
            "hit" => Ok(ItemResult::Hit),
            "miss" => Ok(ItemResult::Miss),
            "voided" => Ok(ItemResult::Voided),
            _ => Err(format!("Invalid item result: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemResult::Pending => "pending",
            ItemResult::Hit => "hit",
            ItemResult::Miss => "miss",
            ItemResult::Voided => "voided",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemResult::Pending)
    }
}

/// A wager on one round, made of one or more line items
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub lottery_code: String,
    pub round_code: String,
    pub total_amount: Decimal, // NUMERIC(16, 2)
    pub status: String,        // Stored as TEXT, use OrderStatus for type safety
    pub win_amount: Decimal,
    pub idempotency_key: Option<String>,
    pub channel: Option<String>,
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status_enum(&self) -> OrderStatus {
        // Unknown text never becomes settleable
        OrderStatus::from_str(&self.status).unwrap_or(OrderStatus::Void)
    }

    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status.as_str().to_string();
    }
}

/// One (selection, stake, odds) unit of an order
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub selection: String,
    /// Odds snapshotted from the house table at placement
    pub odds: Decimal, // NUMERIC(10, 4)
    pub stake_amount: Decimal,
    pub result_status: String,
    pub win_amount: Decimal,
    pub settled_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    pub fn result_enum(&self) -> ItemResult {
        // Unknown text is treated as terminal so it is never paid twice
        ItemResult::from_str(&self.result_status).unwrap_or(ItemResult::Voided)
    }
}

/// A validated line item ready to be persisted
#[derive(Debug, Clone)]
pub struct DraftItem {
    pub selection: Selection,
    pub odds: Decimal,
    pub stake: Decimal,
}

/// A validated order ready to be persisted atomically with its debit
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: i64,
    pub lottery_code: String,
    pub round_code: String,
    pub items: Vec<DraftItem>,
    pub total_amount: Decimal,
    pub idempotency_key: Option<String>,
    pub channel: Option<String>,
    pub client_ip: Option<String>,
    /// Advance to awaiting-settlement once the order row is written
    pub auto_advance: bool,
}

impl OrderDraft {
    /// Status the order ends up in when the placement transaction commits
    pub fn final_status(&self) -> OrderStatus {
        if self.auto_advance {
            OrderStatus::AwaitingSettlement
        } else {
            OrderStatus::Submitted
        }
    }
}

/// Evaluated result for one pending line item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSettlement {
    pub item_id: i64,
    pub result: ItemResult,
    pub win_amount: Decimal,
    pub settled_at: DateTime<Utc>,
}

/// Everything the store must write to settle one order
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementPlan {
    /// Only items that were still pending
    pub updates: Vec<ItemSettlement>,
    /// Includes win amounts previously recorded on terminal items
    pub total_win: Decimal,
    pub status: OrderStatus,
}

/// Evaluate an order's line items against an outcome.
///
/// Terminal items are not re-evaluated; their recorded win amount is carried
/// into the total so re-running settlement never pays twice. `None` when a
/// payout does not fit in a money column.
pub fn plan_settlement(
    items: &[OrderItem],
    outcome: &Outcome,
    now: DateTime<Utc>,
) -> Option<SettlementPlan> {
    let mut total_win = Decimal::ZERO;
    let mut updates = Vec::new();

    for item in items {
        if item.result_enum().is_terminal() {
            total_win = total_win.checked_add(item.win_amount)?;
            continue;
        }

        let hit = match Selection::from_canonical(&item.selection) {
            Some(selection) => selection.is_hit(outcome),
            None => {
                warn!(
                    "Order item {} has unrecognised selection '{}', settling as miss",
                    item.id, item.selection
                );
                false
            }
        };

        let (result, win_amount) = if hit {
            (ItemResult::Hit, q2(item.stake_amount.checked_mul(item.odds)?))
        } else {
            (ItemResult::Miss, q2(Decimal::ZERO))
        };

        total_win = total_win.checked_add(win_amount)?;
        updates.push(ItemSettlement {
            item_id: item.id,
            result,
            win_amount,
            settled_at: now,
        });
    }

    let total_win = Some(q2(total_win)).filter(|t| *t <= max_amount())?;
    let status = if total_win > Decimal::ZERO {
        OrderStatus::Paid
    } else {
        OrderStatus::Lost
    };

    Some(SettlementPlan {
        updates,
        total_win,
        status,
    })
}

/// Result of one settlement attempt, as reported by the store
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// Order settled; `win` credited when positive
    Settled {
        order_id: i64,
        user_id: i64,
        round_code: String,
        stake: Decimal,
        win: Decimal,
        status: OrderStatus,
    },
    /// Order voided (user gone or no line items)
    Voided { order_id: i64, reason: String },
    /// Order was already handled by someone else
    Skipped { order_id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, selection: &str, stake: i64, odds: i64, result: ItemResult, win: i64) -> OrderItem {
        OrderItem {
            id,
            order_id: 1,
            selection: selection.to_string(),
            odds: Decimal::new(odds, 2),
            stake_amount: Decimal::new(stake, 2),
            result_status: result.as_str().to_string(),
            win_amount: Decimal::new(win, 2),
            settled_at: None,
        }
    }

    #[test]
    fn test_plan_pays_big_and_misses_exact() {
        let outcome = Outcome::from_numbers(9, 8, 7).unwrap();
        let items = vec![
            item(1, "big", 1000, 198, ItemResult::Pending, 0),
            item(2, "7", 500, 2600, ItemResult::Pending, 0),
        ];
        let plan = plan_settlement(&items, &outcome, Utc::now()).unwrap();

        assert_eq!(plan.total_win, Decimal::new(1980, 2));
        assert_eq!(plan.status, OrderStatus::Paid);
        assert_eq!(plan.updates[0].result, ItemResult::Hit);
        assert_eq!(plan.updates[0].win_amount, Decimal::new(1980, 2));
        assert_eq!(plan.updates[1].result, ItemResult::Miss);
        assert_eq!(plan.updates[1].win_amount, Decimal::ZERO);
    }

    #[test]
    fn test_plan_skips_terminal_items_but_counts_their_wins() {
        let outcome = Outcome::from_numbers(9, 8, 7).unwrap();
        let items = vec![
            item(1, "big", 1000, 198, ItemResult::Hit, 1980),
            item(2, "small", 500, 198, ItemResult::Pending, 0),
        ];
        let plan = plan_settlement(&items, &outcome, Utc::now()).unwrap();

        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].item_id, 2);
        assert_eq!(plan.total_win, Decimal::new(1980, 2));
        assert_eq!(plan.status, OrderStatus::Paid);
    }

    #[test]
    fn test_plan_rejects_payout_beyond_money_column() {
        let outcome = Outcome::from_numbers(9, 8, 7).unwrap();
        let mut big = item(1, "big", 0, 198, ItemResult::Pending, 0);
        big.stake_amount = max_amount();
        assert_eq!(plan_settlement(&[big], &outcome, Utc::now()), None);
    }

    #[test]
    fn test_plan_all_miss_is_lost() {
        let outcome = Outcome::from_numbers(0, 0, 1).unwrap();
        let items = vec![item(1, "big", 1000, 198, ItemResult::Pending, 0)];
        let plan = plan_settlement(&items, &outcome, Utc::now()).unwrap();
        assert_eq!(plan.status, OrderStatus::Lost);
        assert_eq!(plan.total_win, Decimal::ZERO);
    }

    #[test]
    fn test_order_status_strings() {
        for status in [
            OrderStatus::Submitted,
            OrderStatus::Cancelled,
            OrderStatus::AwaitingSettlement,
            OrderStatus::Paid,
            OrderStatus::Lost,
            OrderStatus::Void,
        ] {
            assert_eq!(OrderStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(OrderStatus::Submitted.is_settleable());
        assert!(!OrderStatus::Paid.is_settleable());
    }
}
