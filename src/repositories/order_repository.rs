//! Repository for orders and their line items.
//!
//! Placement, cancellation and settlement each run in one transaction that
//! locks the order row (when it exists) before the wallet row.

use super::wallet_repository::{append_ledger, lock_wallet, save_wallet};
use super::{void_reason, OrderStore, RepoResult};
use crate::error::RepositoryError;
use crate::models::{
    plan_settlement, BizType, ItemResult, NewLedgerEntry, Order, OrderDraft, OrderItem,
    OrderStatus, Outcome, SettleOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

const ORDER_COLUMNS: &str = "id, user_id, lottery_code, round_code, total_amount, status, \
     win_amount, idempotency_key, channel, client_ip, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, selection, odds, stake_amount, result_status, win_amount, settled_at";

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_order(conn: &mut PgConnection, order_id: i64) -> RepoResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

async fn set_order_status(
    conn: &mut PgConnection,
    order_id: i64,
    status: OrderStatus,
    win_amount: Option<Decimal>,
) -> RepoResult<Order> {
    let sql = format!(
        r#"
        UPDATE orders
        SET status = $2, win_amount = COALESCE($3, win_amount), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        ORDER_COLUMNS
    );
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(order_id)
        .bind(status.as_str())
        .bind(win_amount)
        .fetch_one(&mut *conn)
        .await?;

    Ok(order)
}

async fn fetch_items(conn: &mut PgConnection, order_id: i64) -> RepoResult<Vec<OrderItem>> {
    let sql = format!(
        "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY id",
        ITEM_COLUMNS
    );
    let items = sqlx::query_as::<_, OrderItem>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(items)
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn find_by_idempotency_key(&self, user_id: i64, key: &str) -> RepoResult<Option<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = $1 AND idempotency_key = $2",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn place_order(&self, draft: &OrderDraft) -> RepoResult<Order> {
        let mut tx = self.pool.begin().await?;

        let mut wallet = lock_wallet(&mut *tx, draft.user_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet for user {}", draft.user_id)))?;

        wallet.freeze(draft.total_amount)?;
        save_wallet(&mut *tx, &wallet).await?;

        let sql = format!(
            r#"
            INSERT INTO orders
                (user_id, lottery_code, round_code, total_amount, status, win_amount,
                 idempotency_key, channel, client_ip)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let mut order = sqlx::query_as::<_, Order>(&sql)
            .bind(draft.user_id)
            .bind(&draft.lottery_code)
            .bind(&draft.round_code)
            .bind(draft.total_amount)
            .bind(OrderStatus::Submitted.as_str())
            .bind(draft.idempotency_key.as_deref())
            .bind(draft.channel.as_deref())
            .bind(draft.client_ip.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        for item in &draft.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, selection, odds, stake_amount, result_status, win_amount)
                VALUES ($1, $2, $3, $4, $5, 0)
                "#,
            )
            .bind(order.id)
            .bind(item.selection.canonical_name())
            .bind(item.odds)
            .bind(item.stake)
            .bind(ItemResult::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        }

        if draft.final_status() != OrderStatus::Submitted {
            order = set_order_status(&mut *tx, order.id, draft.final_status(), None).await?;
        }

        let entry = NewLedgerEntry::for_order(&wallet, BizType::Bet, draft.total_amount, order.id, "bet");
        append_ledger(&mut *tx, &entry).await?;

        tx.commit().await?;

        Ok(order)
    }

    async fn cancel_order(&self, user_id: i64, order_id: i64) -> RepoResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut *tx, order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Order {}", order_id)))?;

        if order.status_enum() != OrderStatus::Submitted {
            return Err(RepositoryError::InvalidState(format!(
                "Order {} is {}; only submitted orders can be cancelled",
                order_id, order.status
            )));
        }

        let mut wallet = lock_wallet(&mut *tx, user_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet for user {}", user_id)))?;

        wallet.release(order.total_amount);
        save_wallet(&mut *tx, &wallet).await?;

        let cancelled = set_order_status(&mut *tx, order_id, OrderStatus::Cancelled, None).await?;

        let entry = NewLedgerEntry::for_order(
            &wallet,
            BizType::CancelRefund,
            order.total_amount,
            order_id,
            "cancel refund",
        );
        append_ledger(&mut *tx, &entry).await?;

        tx.commit().await?;

        Ok(cancelled)
    }

    async fn settlement_candidates(&self, limit: i64) -> RepoResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM orders
            WHERE status IN ($1, $2)
            ORDER BY id ASC
            LIMIT $3
            "#,
            ORDER_COLUMNS
        );
        let [first, second] = OrderStatus::SETTLEABLE;
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(first.as_str())
            .bind(second.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    async fn settle_order(
        &self,
        order_id: i64,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> RepoResult<SettleOutcome> {
        let mut tx = self.pool.begin().await?;

        let order = match lock_order(&mut *tx, order_id).await? {
            Some(order) if order.status_enum().is_settleable() => order,
            _ => {
                debug!("Order {} no longer settleable, skipping", order_id);
                return Ok(SettleOutcome::Skipped { order_id });
            }
        };

        let wallet = lock_wallet(&mut *tx, order.user_id).await?;
        let user_exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
            .bind(order.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        let items = fetch_items(&mut *tx, order_id).await?;

        let reason = void_reason(user_exists, wallet.is_some(), items.len());
        let mut wallet = match (reason, wallet) {
            (None, Some(wallet)) => wallet,
            (reason, wallet) => {
                let reason = reason.unwrap_or("wallet not found");

                sqlx::query(
                    r#"
                    UPDATE order_items
                    SET result_status = $2, settled_at = $3
                    WHERE order_id = $1 AND result_status = $4
                    "#,
                )
                .bind(order_id)
                .bind(ItemResult::Voided.as_str())
                .bind(now)
                .bind(ItemResult::Pending.as_str())
                .execute(&mut *tx)
                .await?;

                set_order_status(&mut *tx, order_id, OrderStatus::Void, None).await?;

                if let Some(mut wallet) = wallet {
                    wallet.release(order.total_amount);
                    save_wallet(&mut *tx, &wallet).await?;
                    let entry = NewLedgerEntry::for_order(
                        &wallet,
                        BizType::VoidRefund,
                        order.total_amount,
                        order_id,
                        reason,
                    );
                    append_ledger(&mut *tx, &entry).await?;
                }

                tx.commit().await?;

                return Ok(SettleOutcome::Voided {
                    order_id,
                    reason: reason.to_string(),
                });
            }
        };

        let plan = plan_settlement(&items, outcome, now).ok_or_else(|| {
            RepositoryError::InvalidInput(format!("Payout for order {} overflows", order_id))
        })?;

        for update in &plan.updates {
            sqlx::query(
                r#"
                UPDATE order_items
                SET result_status = $2, win_amount = $3, settled_at = $4
                WHERE id = $1 AND result_status = $5
                "#,
            )
            .bind(update.item_id)
            .bind(update.result.as_str())
            .bind(update.win_amount)
            .bind(update.settled_at)
            .bind(ItemResult::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        }

        wallet.settle(order.total_amount, plan.total_win);
        save_wallet(&mut *tx, &wallet).await?;

        set_order_status(&mut *tx, order_id, plan.status, Some(plan.total_win)).await?;

        if plan.total_win > Decimal::ZERO {
            let entry = NewLedgerEntry::for_order(&wallet, BizType::Payout, plan.total_win, order_id, "payout");
            append_ledger(&mut *tx, &entry).await?;
        }

        tx.commit().await?;

        Ok(SettleOutcome::Settled {
            order_id,
            user_id: order.user_id,
            round_code: order.round_code,
            stake: order.total_amount,
            win: plan.total_win,
            status: plan.status,
        })
    }

    async fn find_order(&self, order_id: i64) -> RepoResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn order_items(&self, order_id: i64) -> RepoResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut *conn, order_id).await
    }

    async fn orders_for_user(&self, user_id: i64, limit: i64) -> RepoResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY id DESC LIMIT $2",
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }
}
