use crate::config::OrderConfig;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{
    max_amount, q2, sum_q2, DraftItem, Order, OrderDraft, OrderItem, OrderStatus, PlayOdds, Selection,
};
use crate::repositories::{LotteryStore, OrderStore, RoundStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// One requested (selection, stake) pair, as sent by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub selection: String,
    pub stake: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: i64,
    pub lottery_code: String,
    pub round_code: String,
    pub selections: Vec<SelectionRequest>,
    pub idempotency_key: Option<String>,
    pub channel: Option<String>,
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderResult {
    pub order_id: i64,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    /// True when an earlier order with the same idempotency key was returned
    pub replayed: bool,
}

impl OrderResult {
    fn from_order(order: &Order, replayed: bool) -> Self {
        Self {
            order_id: order.id,
            total_amount: order.total_amount,
            status: order.status_enum(),
            replayed,
        }
    }
}

/// Order with its line items
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Order placement and cancellation
pub struct OrderService {
    lotteries: Arc<dyn LotteryStore>,
    rounds: Arc<dyn RoundStore>,
    orders: Arc<dyn OrderStore>,
    config: OrderConfig,
}

impl OrderService {
    pub fn new(
        lotteries: Arc<dyn LotteryStore>,
        rounds: Arc<dyn RoundStore>,
        orders: Arc<dyn OrderStore>,
        config: OrderConfig,
    ) -> Self {
        Self {
            lotteries,
            rounds,
            orders,
            config,
        }
    }

    pub async fn place_order(&self, request: PlaceOrderRequest) -> AppResult<OrderResult> {
        self.place_order_at(request, Utc::now()).await
    }

    /// Validate and place an order as of `now`. Checks run in a fixed order and
    /// the first failure wins; nothing is written unless every check passes.
    pub async fn place_order_at(
        &self,
        request: PlaceOrderRequest,
        now: DateTime<Utc>,
    ) -> AppResult<OrderResult> {
        if request.selections.is_empty() {
            return Err(AppError::Validation("At least one selection is required".to_string()));
        }
        if request.selections.len() > self.config.max_selections {
            return Err(AppError::Validation(format!(
                "At most {} selections per order, got {}",
                self.config.max_selections,
                request.selections.len()
            )));
        }

        let idempotency_key = request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self.orders.find_by_idempotency_key(request.user_id, key).await? {
                info!("Replaying order {} for idempotency key {}", existing.id, key);
                return Ok(OrderResult::from_order(&existing, true));
            }
        }

        let odds = self.enabled_odds_by_name(&request.lottery_code).await?;
        let items = request
            .selections
            .iter()
            .map(|requested| Self::draft_item(requested, &odds))
            .collect::<AppResult<Vec<_>>>()?;
        let total_amount = sum_q2(items.iter().map(|i| i.stake)).ok_or_else(|| {
            AppError::Validation(format!("Order total exceeds the maximum of {}", max_amount()))
        })?;

        let round = self
            .rounds
            .find_round(&request.lottery_code, &request.round_code)
            .await?
            .ok_or_else(|| {
                AppError::BettingClosed(format!("Round {} is not open", request.round_code))
            })?;
        if !round.accepts_bets_at(now) {
            return Err(AppError::BettingClosed(format!(
                "Betting for round {} closed at {}",
                round.round_code, round.close_time
            )));
        }

        let draft = OrderDraft {
            user_id: request.user_id,
            lottery_code: request.lottery_code,
            round_code: request.round_code,
            items,
            total_amount,
            idempotency_key,
            channel: request.channel,
            client_ip: request.client_ip,
            auto_advance: self.config.auto_advance,
        };

        match self.orders.place_order(&draft).await {
            Ok(order) => {
                info!(
                    "Order {} placed: user {}, round {}, total {}",
                    order.id, order.user_id, order.round_code, order.total_amount
                );
                Ok(OrderResult::from_order(&order, false))
            }
            Err(RepositoryError::Duplicate(msg)) => {
                // Lost a race with a concurrent request carrying the same key
                let key = draft.idempotency_key.as_deref().unwrap_or_default();
                match self.orders.find_by_idempotency_key(draft.user_id, key).await? {
                    Some(existing) => Ok(OrderResult::from_order(&existing, true)),
                    None => Err(RepositoryError::Duplicate(msg).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel a `submitted` order while its round is still open for betting
    pub async fn cancel_order(&self, user_id: i64, order_id: i64) -> AppResult<OrderResult> {
        self.cancel_order_at(user_id, order_id, Utc::now()).await
    }

    pub async fn cancel_order_at(
        &self,
        user_id: i64,
        order_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<OrderResult> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        if order.status_enum() != OrderStatus::Submitted {
            return Err(AppError::BusinessLogic(format!(
                "Order {} is {}; only submitted orders can be cancelled",
                order_id, order.status
            )));
        }

        let open = self
            .rounds
            .find_round(&order.lottery_code, &order.round_code)
            .await?
            .map_or(false, |round| round.accepts_bets_at(now));
        if !open {
            return Err(AppError::BettingClosed(format!(
                "Round {} no longer accepts changes",
                order.round_code
            )));
        }

        let cancelled = self.orders.cancel_order(user_id, order_id).await?;
        info!(
            "Order {} cancelled: user {}, refunded {}",
            order_id, user_id, cancelled.total_amount
        );

        Ok(OrderResult::from_order(&cancelled, false))
    }

    pub async fn get_order(&self, user_id: i64, order_id: i64) -> AppResult<OrderDetail> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
        let items = self.orders.order_items(order_id).await?;

        Ok(OrderDetail { order, items })
    }

    pub async fn list_orders(&self, user_id: i64, limit: i64) -> AppResult<Vec<Order>> {
        Ok(self.orders.orders_for_user(user_id, limit.clamp(1, 200)).await?)
    }

    /// Full odds table, disabled rows included
    pub async fn odds_table(&self, lottery_code: &str) -> AppResult<Vec<PlayOdds>> {
        Ok(self.lotteries.odds_table(lottery_code).await?)
    }

    async fn enabled_odds_by_name(&self, lottery_code: &str) -> AppResult<HashMap<String, Decimal>> {
        let odds = self.lotteries.enabled_odds(lottery_code).await?;
        if odds.is_empty() {
            warn!("No enabled odds configured for lottery {}", lottery_code);
            return Err(AppError::Validation(format!(
                "Lottery {} has no enabled plays",
                lottery_code
            )));
        }

        Ok(odds.into_iter().map(|o| (o.name, o.odds)).collect())
    }

    fn draft_item(requested: &SelectionRequest, odds: &HashMap<String, Decimal>) -> AppResult<DraftItem> {
        let selection = Selection::normalize(&requested.selection).ok_or_else(|| {
            AppError::Validation(format!("Unknown selection '{}'", requested.selection))
        })?;

        let odds = odds.get(&selection.canonical_name()).copied().ok_or_else(|| {
            AppError::Validation(format!("Selection '{}' is not available", selection))
        })?;

        let stake = q2(requested.stake);
        if stake <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Stake for '{}' must be positive, got {}",
                selection, requested.stake
            )));
        }
        if stake > max_amount() {
            return Err(AppError::Validation(format!(
                "Stake for '{}' exceeds the maximum of {}",
                selection,
                max_amount()
            )));
        }

        Ok(DraftItem {
            selection,
            odds,
            stake,
        })
    }
}
