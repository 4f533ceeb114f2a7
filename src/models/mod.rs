//! Domain models for the sum-28 backend.
//!
//! Row types map one-to-one onto tables; value types (`Outcome`,
//! `Selection`) carry the game rules.

pub mod lottery;
pub mod money;
pub mod order;
pub mod outcome;
pub mod round;
pub mod selection;
pub mod user;
pub mod wallet;

// Re-export all models for convenient access
pub use lottery::{LotteryConfig, PlayOdds};
pub use money::{max_amount, q2, sum_q2};
pub use order::{
    plan_settlement, DraftItem, ItemResult, ItemSettlement, Order, OrderDraft, OrderItem,
    OrderStatus, SettleOutcome, SettlementPlan,
};
pub use outcome::{BigSmall, ExtremeTier, OddEven, Outcome};
pub use round::{DrawnRound, PendingRound, Round, RoundStatus};
pub use selection::Selection;
pub use user::User;
pub use wallet::{BizType, LedgerDirection, LedgerEntry, NewLedgerEntry, WalletAccount};
