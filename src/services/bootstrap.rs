//! Startup tasks: make sure the managed lottery exists and warm the caches.

use super::issue_service::IssueService;
use crate::config::LotteryDefaults;
use crate::error::AppResult;
use crate::models::LotteryConfig;
use crate::repositories::LotteryStore;
use tracing::info;

/// Insert the default lottery row if it is missing
pub async fn ensure_default_lottery(
    lotteries: &dyn LotteryStore,
    defaults: &LotteryDefaults,
) -> AppResult<LotteryConfig> {
    let wanted = LotteryConfig::new(
        &defaults.code,
        &defaults.name,
        defaults.period_seconds,
        defaults.lock_ahead_seconds,
    );
    let lottery = lotteries.ensure_lottery(&wanted).await?;

    info!(
        "Lottery {} ready: period {}s, lock-ahead {}s",
        lottery.code, lottery.period_seconds, lottery.lock_ahead_seconds
    );
    Ok(lottery)
}

/// Everything that must happen before the scheduler starts
pub async fn run(
    lotteries: &dyn LotteryStore,
    defaults: &LotteryDefaults,
    issues: &IssueService,
) -> AppResult<()> {
    ensure_default_lottery(lotteries, defaults).await?;
    issues.warm_up().await?;
    Ok(())
}
