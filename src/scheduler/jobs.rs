//! Adapters that expose the services as periodic jobs.

use super::{JobSchedule, PeriodicJob, Scheduler};
use crate::config::{CollectorConfig, SchedulerConfig};
use crate::services::{DrawCollector, IssueService, SettlementEngine};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const COLLECTOR_JOB: &str = "draw_collector";
pub const BETTING_WINDOW_JOB: &str = "betting_window_tick";
pub const SETTLEMENT_JOB: &str = "settlement";

/// Poll the provider and ingest the latest draw
pub struct CollectorJob {
    collector: Arc<DrawCollector>,
}

impl CollectorJob {
    pub fn new(collector: Arc<DrawCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl PeriodicJob for CollectorJob {
    fn name(&self) -> &'static str {
        COLLECTOR_JOB
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.collector.poll_once().await?;
        Ok(())
    }
}

/// Keep the published betting flag in step with the wall clock
pub struct BettingWindowJob {
    issues: Arc<IssueService>,
}

impl BettingWindowJob {
    pub fn new(issues: Arc<IssueService>) -> Self {
        Self { issues }
    }
}

#[async_trait]
impl PeriodicJob for BettingWindowJob {
    fn name(&self) -> &'static str {
        BETTING_WINDOW_JOB
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.issues.refresh_betting_window().await?;
        Ok(())
    }
}

pub struct SettlementJob {
    engine: Arc<SettlementEngine>,
}

impl SettlementJob {
    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl PeriodicJob for SettlementJob {
    fn name(&self) -> &'static str {
        SETTLEMENT_JOB
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.engine.run_cycle().await?;
        Ok(())
    }
}

/// Scheduler with the collector, betting-window and settlement jobs registered
pub fn standard_scheduler(
    config: &SchedulerConfig,
    collector_config: &CollectorConfig,
    collector: Arc<DrawCollector>,
    issues: Arc<IssueService>,
    engine: Arc<SettlementEngine>,
) -> Scheduler {
    let mut scheduler = Scheduler::new();

    scheduler
        .add_job(
            Arc::new(CollectorJob::new(collector)),
            JobSchedule::every(
                collector_config.poll_interval(),
                Duration::from_secs(config.collector_grace_secs),
            ),
        )
        .add_job(
            Arc::new(BettingWindowJob::new(issues)),
            JobSchedule::every(
                Duration::from_secs(config.window_tick_seconds),
                Duration::from_secs(config.window_tick_grace_secs),
            ),
        )
        .add_job(
            Arc::new(SettlementJob::new(engine)),
            JobSchedule::every(
                Duration::from_secs(config.settlement_interval_seconds),
                Duration::from_secs(config.settlement_grace_secs),
            ),
        );

    scheduler
}
