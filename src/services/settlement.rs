use super::outcome::OutcomeResolver;
use crate::error::AppResult;
use crate::models::{Outcome, SettleOutcome};
use crate::repositories::OrderStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tally of one settlement cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub candidates: usize,
    /// Orders whose round has no outcome yet
    pub unresolved: usize,
    pub settled: usize,
    pub voided: usize,
    /// Orders another worker handled first
    pub skipped: usize,
    pub failed: usize,
    pub total_paid: Decimal,
}

/// Settles orders against drawn outcomes in bounded batches
pub struct SettlementEngine {
    orders: Arc<dyn OrderStore>,
    resolver: Arc<dyn OutcomeResolver>,
    batch_limit: i64,
}

impl SettlementEngine {
    pub fn new(orders: Arc<dyn OrderStore>, resolver: Arc<dyn OutcomeResolver>, batch_limit: i64) -> Self {
        Self {
            orders,
            resolver,
            batch_limit,
        }
    }

    pub async fn run_cycle(&self) -> AppResult<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// One cycle: read the oldest settleable orders, resolve each distinct round
    /// once, then settle every resolvable order in its own transaction.
    ///
    /// A failure on one order is logged and the cycle moves on.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> AppResult<CycleReport> {
        let candidates = self.orders.settlement_candidates(self.batch_limit).await?;
        let mut report = CycleReport {
            candidates: candidates.len(),
            ..CycleReport::default()
        };
        if candidates.is_empty() {
            return Ok(report);
        }

        let mut outcomes: HashMap<(String, String), Option<Outcome>> = HashMap::new();
        for order in &candidates {
            let key = (order.lottery_code.clone(), order.round_code.clone());
            if outcomes.contains_key(&key) {
                continue;
            }
            let outcome = match self.resolver.resolve(&key.0, &key.1).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Failed to resolve round {}/{}: {}", key.0, key.1, e);
                    None
                }
            };
            outcomes.insert(key, outcome);
        }

        for order in &candidates {
            let key = (order.lottery_code.clone(), order.round_code.clone());
            let outcome = match outcomes.get(&key).copied().flatten() {
                Some(outcome) => outcome,
                None => {
                    report.unresolved += 1;
                    continue;
                }
            };

            match self.orders.settle_order(order.id, &outcome, now).await {
                Ok(SettleOutcome::Settled {
                    order_id,
                    user_id,
                    round_code,
                    stake,
                    win,
                    status,
                }) => {
                    info!(
                        "Settled order {}: round {}, user {}, stake {}, win {} ({})",
                        order_id,
                        round_code,
                        user_id,
                        stake,
                        win,
                        status.as_str()
                    );
                    report.settled += 1;
                    report.total_paid += win;
                }
                Ok(SettleOutcome::Voided { order_id, reason }) => {
                    warn!("Voided order {}: {}", order_id, reason);
                    report.voided += 1;
                }
                Ok(SettleOutcome::Skipped { order_id }) => {
                    debug!("Order {} already handled", order_id);
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("Failed to settle order {}: {}", order.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.settled + report.voided + report.failed > 0 {
            info!(
                "Settlement cycle: {} candidates, {} settled, {} voided, {} failed, {} unresolved, paid {}",
                report.candidates,
                report.settled,
                report.voided,
                report.failed,
                report.unresolved,
                report.total_paid
            );
        } else {
            debug!(
                "Settlement cycle: {} candidates, none resolvable",
                report.candidates
            );
        }

        Ok(report)
    }
}
