//! Wallet account and ledger models.
//!
//! Accounts use the available/frozen split: a placed order moves its stake
//! from available to frozen, settlement consumes the frozen stake and credits
//! winnings to available, cancellation moves the stake back.

use super::money::q2;
use crate::error::RepositoryError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One wallet per user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletAccount {
    pub id: i64,
    pub user_id: i64,
    pub available: Decimal,
    pub frozen: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    pub fn new(id: i64, user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            available: Decimal::ZERO,
            frozen: Decimal::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Single-balance view (available + frozen)
    pub fn total_balance(&self) -> Decimal {
        self.available + self.frozen
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Move `amount` from available to frozen for a new order
    pub fn freeze(&mut self, amount: Decimal) -> Result<(), RepositoryError> {
        if amount <= Decimal::ZERO {
            return Err(RepositoryError::InvalidInput(format!(
                "freeze amount must be positive, got {}",
                amount
            )));
        }
        if self.available < amount {
            return Err(RepositoryError::InsufficientFunds {
                available: self.available,
                required: amount,
            });
        }
        self.available = q2(self.available - amount);
        self.frozen = q2(self.frozen + amount);
        self.touch();
        Ok(())
    }

    /// Return a frozen stake to available (cancel or void)
    pub fn release(&mut self, amount: Decimal) {
        let released = amount.min(self.frozen).max(Decimal::ZERO);
        self.frozen = q2(self.frozen - released);
        self.available = q2(self.available + released);
        self.touch();
    }

    /// Consume a frozen stake at settlement and credit winnings
    pub fn settle(&mut self, stake: Decimal, win: Decimal) {
        let consumed = stake.min(self.frozen).max(Decimal::ZERO);
        self.frozen = q2(self.frozen - consumed);
        self.available = q2(self.available + win.max(Decimal::ZERO));
        self.touch();
    }

    /// Plain credit to available (deposits)
    pub fn credit(&mut self, amount: Decimal) -> Result<(), RepositoryError> {
        if amount <= Decimal::ZERO {
            return Err(RepositoryError::InvalidInput(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }
        self.available = q2(self.available + amount);
        self.touch();
        Ok(())
    }
}

/// Ledger direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerDirection {
    Credit,
    Debit,
}

impl LedgerDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(Self::Credit),
            "debit" => Some(Self::Debit),
            _ => None,
        }
    }
}

/// Business reason for a balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BizType {
    Deposit,
    Bet,
    CancelRefund,
    Payout,
    VoidRefund,
}

impl BizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Bet => "bet",
            Self::CancelRefund => "cancel_refund",
            Self::Payout => "payout",
            Self::VoidRefund => "void_refund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(Self::Deposit),
            "bet" => Some(Self::Bet),
            "cancel_refund" => Some(Self::CancelRefund),
            "payout" => Some(Self::Payout),
            "void_refund" => Some(Self::VoidRefund),
            _ => None,
        }
    }

    pub fn direction(&self) -> LedgerDirection {
        match self {
            Self::Bet => LedgerDirection::Debit,
            _ => LedgerDirection::Credit,
        }
    }
}

/// Append-only audit record of a balance mutation
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub direction: String,
    pub amount: Decimal,
    /// Available balance after the mutation
    pub balance_after: Decimal,
    pub biz_type: String,
    pub ref_table: Option<String>,
    pub ref_id: Option<i64>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn biz(&self) -> Option<BizType> {
        BizType::from_str(&self.biz_type)
    }
}

/// Ledger row to be appended inside a store transaction
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: i64,
    pub biz_type: BizType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub order_id: Option<i64>,
    pub remark: Option<String>,
}

impl NewLedgerEntry {
    /// Ledger row for a mutation tied to an order
    pub fn for_order(wallet: &WalletAccount, biz_type: BizType, amount: Decimal, order_id: i64, remark: &str) -> Self {
        Self {
            user_id: wallet.user_id,
            biz_type,
            amount,
            balance_after: wallet.available,
            order_id: Some(order_id),
            remark: Some(remark.to_string()),
        }
    }

    pub fn ref_table(&self) -> Option<&'static str> {
        self.order_id.map(|_| "orders")
    }

    pub fn into_entry(self, id: i64, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: self.user_id,
            direction: self.biz_type.direction().as_str().to_string(),
            amount: self.amount,
            balance_after: self.balance_after,
            biz_type: self.biz_type.as_str().to_string(),
            ref_table: self.ref_table().map(str::to_string),
            ref_id: self.order_id,
            remark: self.remark,
            created_at,
        }
    }
}
