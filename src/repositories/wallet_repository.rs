//! Repository for users, wallet accounts and the wallet ledger

use super::{RepoResult, WalletStore};
use crate::error::RepositoryError;
use crate::models::{q2, BizType, LedgerEntry, NewLedgerEntry, User, WalletAccount};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

pub(crate) const WALLET_COLUMNS: &str =
    "id, user_id, available, frozen, version, created_at, updated_at";

pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =========================================================================
// Transaction helpers shared with the order repository
// =========================================================================

/// Lock the user's wallet row for the rest of the transaction
pub(crate) async fn lock_wallet(
    conn: &mut PgConnection,
    user_id: i64,
) -> RepoResult<Option<WalletAccount>> {
    let sql = format!(
        "SELECT {} FROM wallet_accounts WHERE user_id = $1 FOR UPDATE",
        WALLET_COLUMNS
    );
    let wallet = sqlx::query_as::<_, WalletAccount>(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(wallet)
}

/// Persist balances mutated in memory by the `WalletAccount` rules
pub(crate) async fn save_wallet(conn: &mut PgConnection, wallet: &WalletAccount) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE wallet_accounts
        SET available = $2, frozen = $3, version = $4, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(wallet.id)
    .bind(wallet.available)
    .bind(wallet.frozen)
    .bind(wallet.version)
    .bind(wallet.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn append_ledger(conn: &mut PgConnection, entry: &NewLedgerEntry) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO wallet_ledger
            (user_id, direction, amount, balance_after, biz_type, ref_table, ref_id, remark)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.biz_type.direction().as_str())
    .bind(entry.amount)
    .bind(entry.balance_after)
    .bind(entry.biz_type.as_str())
    .bind(entry.ref_table())
    .bind(entry.order_id)
    .bind(entry.remark.as_deref())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl WalletStore for WalletRepository {
    async fn create_user(&self, username: &str) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username)
            VALUES ($1)
            RETURNING id, username, status, created_at
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, status, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn ensure_account(&self, user_id: i64) -> RepoResult<WalletAccount> {
        sqlx::query(
            r#"
            INSERT INTO wallet_accounts (user_id, available, frozen, version)
            VALUES ($1, 0, 0, 0)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {} FROM wallet_accounts WHERE user_id = $1", WALLET_COLUMNS);
        let wallet = sqlx::query_as::<_, WalletAccount>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(wallet)
    }

    async fn find_wallet(&self, user_id: i64) -> RepoResult<Option<WalletAccount>> {
        let sql = format!("SELECT {} FROM wallet_accounts WHERE user_id = $1", WALLET_COLUMNS);
        let wallet = sqlx::query_as::<_, WalletAccount>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(wallet)
    }

    async fn deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        remark: Option<&str>,
    ) -> RepoResult<WalletAccount> {
        let mut tx = self.pool.begin().await?;

        let mut wallet = lock_wallet(&mut *tx, user_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet for user {}", user_id)))?;

        wallet.credit(amount)?;
        save_wallet(&mut *tx, &wallet).await?;

        let entry = NewLedgerEntry {
            user_id,
            biz_type: BizType::Deposit,
            amount: q2(amount),
            balance_after: wallet.available,
            order_id: None,
            remark: remark.map(str::to_string),
        };
        append_ledger(&mut *tx, &entry).await?;

        tx.commit().await?;

        Ok(wallet)
    }

    async fn ledger(&self, user_id: i64, limit: i64) -> RepoResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, direction, amount, balance_after, biz_type, ref_table, ref_id, remark, created_at
            FROM wallet_ledger
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

