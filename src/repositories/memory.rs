//! In-process store honouring the same contracts as the Postgres repositories.
//!
//! All state sits behind one async mutex; each trait call takes it once and
//! only writes after every check has passed, which gives the same
//! all-or-nothing behaviour as a database transaction.

use super::{void_reason, LotteryStore, OrderStore, RepoResult, RoundStore, WalletStore};
use crate::error::RepositoryError;
use crate::models::{
    plan_settlement, BizType, DrawnRound, ItemResult, LedgerEntry, LotteryConfig, NewLedgerEntry,
    Order, OrderDraft, OrderItem, OrderStatus, Outcome, PendingRound, PlayOdds, Round,
    SettleOutcome, User, WalletAccount,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Default)]
struct Sequences {
    user: i64,
    wallet: i64,
    ledger: i64,
    round: i64,
    order: i64,
    item: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Default)]
struct State {
    seq: Sequences,
    users: BTreeMap<i64, User>,
    /// Keyed by user id
    wallets: BTreeMap<i64, WalletAccount>,
    ledger: Vec<LedgerEntry>,
    lotteries: HashMap<String, LotteryConfig>,
    odds: Vec<PlayOdds>,
    /// Keyed by (lottery code, round code)
    rounds: HashMap<(String, String), Round>,
    orders: BTreeMap<i64, Order>,
    items: BTreeMap<i64, OrderItem>,
}

impl State {
    fn append_ledger(&mut self, entry: NewLedgerEntry) {
        let id = next(&mut self.seq.ledger);
        self.ledger.push(entry.into_entry(id, Utc::now()));
    }

    fn items_of(&self, order_id: i64) -> Vec<OrderItem> {
        self.items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete a user together with their wallet; orders and ledger rows stay
    pub async fn remove_user(&self, user_id: i64) {
        let mut state = self.state.lock().await;
        state.users.remove(&user_id);
        state.wallets.remove(&user_id);
    }
}

#[async_trait]
impl LotteryStore for MemoryStore {
    async fn lottery_config(&self, code: &str) -> RepoResult<Option<LotteryConfig>> {
        Ok(self.state.lock().await.lotteries.get(code).cloned())
    }

    async fn ensure_lottery(&self, config: &LotteryConfig) -> RepoResult<LotteryConfig> {
        let mut state = self.state.lock().await;
        Ok(state
            .lotteries
            .entry(config.code.clone())
            .or_insert_with(|| config.clone())
            .clone())
    }

    async fn enabled_odds(&self, lottery_code: &str) -> RepoResult<Vec<PlayOdds>> {
        Ok(self
            .odds_table(lottery_code)
            .await?
            .into_iter()
            .filter(PlayOdds::is_enabled)
            .collect())
    }

    async fn odds_table(&self, lottery_code: &str) -> RepoResult<Vec<PlayOdds>> {
        let state = self.state.lock().await;
        let mut odds: Vec<PlayOdds> = state
            .odds
            .iter()
            .filter(|o| o.lottery_code == lottery_code)
            .cloned()
            .collect();
        odds.sort_by_key(|o| o.code);
        Ok(odds)
    }

    async fn upsert_odds(&self, odds: &PlayOdds) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        match state
            .odds
            .iter_mut()
            .find(|o| o.lottery_code == odds.lottery_code && o.name == odds.name)
        {
            Some(existing) => *existing = odds.clone(),
            None => state.odds.push(odds.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl RoundStore for MemoryStore {
    async fn upsert_drawn_round(&self, draw: &DrawnRound) -> RepoResult<Round> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let key = (draw.lottery_code.clone(), draw.round_code.clone());

        if let Some(round) = state.rounds.get_mut(&key) {
            round.apply_draw(draw, now);
            return Ok(round.clone());
        }

        let id = next(&mut state.seq.round);
        let round = Round::from_drawn(id, draw, now);
        state.rounds.insert(key, round.clone());
        Ok(round)
    }

    async fn ensure_pending_round(&self, pending: &PendingRound) -> RepoResult<Round> {
        let mut state = self.state.lock().await;
        let key = (pending.lottery_code.clone(), pending.round_code.clone());

        if let Some(round) = state.rounds.get(&key) {
            return Ok(round.clone());
        }

        let id = next(&mut state.seq.round);
        let round = Round::from_pending(id, pending, Utc::now());
        state.rounds.insert(key, round.clone());
        Ok(round)
    }

    async fn find_round(&self, lottery_code: &str, round_code: &str) -> RepoResult<Option<Round>> {
        let state = self.state.lock().await;
        Ok(state
            .rounds
            .get(&(lottery_code.to_string(), round_code.to_string()))
            .cloned())
    }

    async fn recent_drawn_rounds(&self, lottery_code: &str, limit: i64) -> RepoResult<Vec<Round>> {
        let state = self.state.lock().await;
        let mut rounds: Vec<Round> = state
            .rounds
            .values()
            .filter(|r| r.lottery_code == lottery_code && r.is_drawn())
            .cloned()
            .collect();
        rounds.sort_by(|a, b| b.open_time.cmp(&a.open_time).then(b.id.cmp(&a.id)));
        rounds.truncate(limit.max(0) as usize);
        Ok(rounds)
    }

    async fn latest_drawn_round(&self, lottery_code: &str) -> RepoResult<Option<Round>> {
        Ok(self.recent_drawn_rounds(lottery_code, 1).await?.into_iter().next())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_by_idempotency_key(&self, user_id: i64, key: &str) -> RepoResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn place_order(&self, draft: &OrderDraft) -> RepoResult<Order> {
        let mut state = self.state.lock().await;

        if let Some(key) = draft.idempotency_key.as_deref() {
            let clash = state
                .orders
                .values()
                .any(|o| o.user_id == draft.user_id && o.idempotency_key.as_deref() == Some(key));
            if clash {
                return Err(RepositoryError::Duplicate(format!(
                    "order for user {} with idempotency key {}",
                    draft.user_id, key
                )));
            }
        }

        let mut wallet = state
            .wallets
            .get(&draft.user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet for user {}", draft.user_id)))?;
        wallet.freeze(draft.total_amount)?;

        let now = Utc::now();
        let order = Order {
            id: next(&mut state.seq.order),
            user_id: draft.user_id,
            lottery_code: draft.lottery_code.clone(),
            round_code: draft.round_code.clone(),
            total_amount: draft.total_amount,
            status: draft.final_status().as_str().to_string(),
            win_amount: Decimal::ZERO,
            idempotency_key: draft.idempotency_key.clone(),
            channel: draft.channel.clone(),
            client_ip: draft.client_ip.clone(),
            created_at: now,
            updated_at: now,
        };

        for item in &draft.items {
            let id = next(&mut state.seq.item);
            state.items.insert(
                id,
                OrderItem {
                    id,
                    order_id: order.id,
                    selection: item.selection.canonical_name(),
                    odds: item.odds,
                    stake_amount: item.stake,
                    result_status: ItemResult::Pending.as_str().to_string(),
                    win_amount: Decimal::ZERO,
                    settled_at: None,
                },
            );
        }

        state.append_ledger(NewLedgerEntry::for_order(
            &wallet,
            BizType::Bet,
            draft.total_amount,
            order.id,
            "bet",
        ));
        state.wallets.insert(draft.user_id, wallet);
        state.orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn cancel_order(&self, user_id: i64, order_id: i64) -> RepoResult<Order> {
        let mut state = self.state.lock().await;

        let mut order = state
            .orders
            .get(&order_id)
            .filter(|o| o.user_id == user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Order {}", order_id)))?;

        if order.status_enum() != OrderStatus::Submitted {
            return Err(RepositoryError::InvalidState(format!(
                "Order {} is {}; only submitted orders can be cancelled",
                order_id, order.status
            )));
        }

        let mut wallet = state
            .wallets
            .get(&user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet for user {}", user_id)))?;
        wallet.release(order.total_amount);

        order.set_status(OrderStatus::Cancelled);
        order.updated_at = Utc::now();

        state.append_ledger(NewLedgerEntry::for_order(
            &wallet,
            BizType::CancelRefund,
            order.total_amount,
            order_id,
            "cancel refund",
        ));
        state.wallets.insert(user_id, wallet);
        state.orders.insert(order_id, order.clone());

        Ok(order)
    }

    async fn settlement_candidates(&self, limit: i64) -> RepoResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.status_enum().is_settleable())
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn settle_order(
        &self,
        order_id: i64,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> RepoResult<SettleOutcome> {
        let mut state = self.state.lock().await;

        let mut order = match state.orders.get(&order_id) {
            Some(order) if order.status_enum().is_settleable() => order.clone(),
            _ => return Ok(SettleOutcome::Skipped { order_id }),
        };

        let user_exists = state.users.contains_key(&order.user_id);
        let wallet = state.wallets.get(&order.user_id).cloned();
        let items = state.items_of(order_id);

        let reason = void_reason(user_exists, wallet.is_some(), items.len());
        let mut wallet = match (reason, wallet) {
            (None, Some(wallet)) => wallet,
            (reason, wallet) => {
                let reason = reason.unwrap_or("wallet not found");

                for item in state.items.values_mut().filter(|i| i.order_id == order_id) {
                    if !item.result_enum().is_terminal() {
                        item.result_status = ItemResult::Voided.as_str().to_string();
                        item.settled_at = Some(now);
                    }
                }

                order.set_status(OrderStatus::Void);
                order.updated_at = now;
                state.orders.insert(order_id, order.clone());

                if let Some(mut wallet) = wallet {
                    wallet.release(order.total_amount);
                    state.append_ledger(NewLedgerEntry::for_order(
                        &wallet,
                        BizType::VoidRefund,
                        order.total_amount,
                        order_id,
                        reason,
                    ));
                    state.wallets.insert(order.user_id, wallet);
                }

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
            if let Some(item) = state.items.get_mut(&update.item_id) {
                item.result_status = update.result.as_str().to_string();
                item.win_amount = update.win_amount;
                item.settled_at = Some(update.settled_at);
            }
        }

        wallet.settle(order.total_amount, plan.total_win);

        order.set_status(plan.status);
        order.win_amount = plan.total_win;
        order.updated_at = now;

        if plan.total_win > Decimal::ZERO {
            state.append_ledger(NewLedgerEntry::for_order(
                &wallet,
                BizType::Payout,
                plan.total_win,
                order_id,
                "payout",
            ));
        }
        state.wallets.insert(order.user_id, wallet);
        state.orders.insert(order_id, order.clone());

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
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn order_items(&self, order_id: i64) -> RepoResult<Vec<OrderItem>> {
        Ok(self.state.lock().await.items_of(order_id))
    }

    async fn orders_for_user(&self, user_id: i64, limit: i64) -> RepoResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| o.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn create_user(&self, username: &str) -> RepoResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username == username) {
            return Err(RepositoryError::Duplicate(format!("username {}", username)));
        }
        let user = User {
            id: next(&mut state.seq.user),
            username: username.to_string(),
            status: 1,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> RepoResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn ensure_account(&self, user_id: i64) -> RepoResult<WalletAccount> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "user {} does not exist",
                user_id
            )));
        }
        if let Some(wallet) = state.wallets.get(&user_id) {
            return Ok(wallet.clone());
        }
        let wallet = WalletAccount::new(next(&mut state.seq.wallet), user_id);
        state.wallets.insert(user_id, wallet.clone());
        Ok(wallet)
    }

    async fn find_wallet(&self, user_id: i64) -> RepoResult<Option<WalletAccount>> {
        Ok(self.state.lock().await.wallets.get(&user_id).cloned())
    }

    async fn deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        remark: Option<&str>,
    ) -> RepoResult<WalletAccount> {
        let mut state = self.state.lock().await;
        let mut wallet = state
            .wallets
            .get(&user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet for user {}", user_id)))?;
        wallet.credit(amount)?;

        state.append_ledger(NewLedgerEntry {
            user_id,
            biz_type: BizType::Deposit,
            amount: crate::models::q2(amount),
            balance_after: wallet.available,
            order_id: None,
            remark: remark.map(str::to_string),
        });
        state.wallets.insert(user_id, wallet.clone());
        Ok(wallet)
    }

    async fn ledger(&self, user_id: i64, limit: i64) -> RepoResult<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DraftItem, Selection};

    async fn funded_user(store: &MemoryStore, cents: i64) -> i64 {
        let user = store.create_user("alice").await.unwrap();
        store.ensure_account(user.id).await.unwrap();
        store
            .deposit(user.id, Decimal::new(cents, 2), None)
            .await
            .unwrap();
        user.id
    }

    fn draft(user_id: i64, stake_cents: i64, key: Option<&str>) -> OrderDraft {
        OrderDraft {
            user_id,
            lottery_code: "jnd28".into(),
            round_code: "100".into(),
            items: vec![DraftItem {
                selection: Selection::Big,
                odds: Decimal::new(198, 2),
                stake: Decimal::new(stake_cents, 2),
            }],
            total_amount: Decimal::new(stake_cents, 2),
            idempotency_key: key.map(str::to_string),
            channel: None,
            client_ip: None,
            auto_advance: true,
        }
    }

    #[tokio::test]
    async fn test_failed_placement_leaves_no_trace() {
        let store = MemoryStore::new();
        let user_id = funded_user(&store, 500).await;

        let err = store.place_order(&draft(user_id, 800, None)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientFunds { .. }));

        assert!(store.orders_for_user(user_id, 10).await.unwrap().is_empty());
        let wallet = store.find_wallet(user_id).await.unwrap().unwrap();
        assert_eq!(wallet.available, Decimal::new(500, 2));
        assert_eq!(store.ledger(user_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_is_rejected() {
        let store = MemoryStore::new();
        let user_id = funded_user(&store, 5000).await;

        store.place_order(&draft(user_id, 100, Some("k1"))).await.unwrap();
        let err = store
            .place_order(&draft(user_id, 100, Some("k1")))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing_round() {
        let store = MemoryStore::new();
        let open = Utc::now();
        let pending = PendingRound {
            lottery_code: "jnd28".into(),
            round_code: "100".into(),
            open_time: open,
            close_time: open - chrono::Duration::seconds(3),
        };
        let created = store.ensure_pending_round(&pending).await.unwrap();

        let drawn = store
            .upsert_drawn_round(&DrawnRound {
                lottery_code: "jnd28".into(),
                round_code: "100".into(),
                open_time: open,
                close_time: pending.close_time,
                outcome: Outcome::from_numbers(1, 2, 3).unwrap(),
                raw_payload: "{}".into(),
            })
            .await
            .unwrap();
        assert_eq!(drawn.id, created.id);
        assert!(drawn.is_drawn());

        // A later pending insert never clobbers a drawn row
        let again = store.ensure_pending_round(&pending).await.unwrap();
        assert!(again.is_drawn());
    }
}
