//! Periodic job runner.
//!
//! Each job runs on its own task and awaits its previous run before the next
//! tick, so a job never overlaps itself. Missed ticks are coalesced, and a
//! tick that fires later than the job's misfire grace window is dropped.

pub mod jobs;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct JobSchedule {
    pub interval: Duration,
    pub misfire_grace: Duration,
}

impl JobSchedule {
    pub fn every(interval: Duration, misfire_grace: Duration) -> Self {
        Self {
            interval,
            misfire_grace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// A previous run was still in flight
    AlreadyRunning,
}

pub fn is_misfire(lateness: Duration, grace: Duration) -> bool {
    lateness > grace
}

/// A job plus its in-flight flag
pub struct GuardedJob {
    job: Arc<dyn PeriodicJob>,
    running: AtomicBool,
}

struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl GuardedJob {
    pub fn new(job: Arc<dyn PeriodicJob>) -> Self {
        Self {
            job,
            running: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    /// Run once unless a run is already in flight. Errors and panics are
    /// logged as a failed run, not returned.
    pub async fn try_run(&self) -> RunOutcome {
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("Job {} still running, skipping", self.name());
            return RunOutcome::AlreadyRunning;
        }
        let _flag = RunningFlag(&self.running);

        match AssertUnwindSafe(self.job.run()).catch_unwind().await {
            Ok(Ok(())) => RunOutcome::Completed,
            Ok(Err(e)) => {
                error!("Job {} failed: {:#}", self.name(), e);
                RunOutcome::Failed
            }
            Err(panic) => {
                error!("Job {} panicked: {}", self.name(), panic_message(panic.as_ref()));
                RunOutcome::Failed
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

pub struct Scheduler {
    jobs: Vec<(Arc<GuardedJob>, JobSchedule)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn add_job(&mut self, job: Arc<dyn PeriodicJob>, schedule: JobSchedule) -> &mut Self {
        self.jobs.push((Arc::new(GuardedJob::new(job)), schedule));
        self
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|(job, _)| job.name()).collect()
    }

    /// Run a job immediately, outside its schedule, honouring the no-overlap guard
    pub async fn trigger(&self, name: &str) -> Option<RunOutcome> {
        let (job, _) = self.jobs.iter().find(|(job, _)| job.name() == name)?;
        Some(job.try_run().await)
    }

    /// Spawn one task per job
    pub fn start(&self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = self
            .jobs
            .iter()
            .map(|(job, schedule)| {
                let job = job.clone();
                let schedule = *schedule;
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move { run_loop(job, schedule, shutdown).await })
            })
            .collect();

        info!("Scheduler started with {} jobs", self.jobs.len());
        SchedulerHandle { shutdown_tx, tasks }
    }
}

async fn run_loop(job: Arc<GuardedJob>, schedule: JobSchedule, mut shutdown: watch::Receiver<bool>) {
    let mut interval = time::interval(schedule.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Job {} scheduled every {:?}", job.name(), schedule.interval);

    loop {
        tokio::select! {
            scheduled = interval.tick() => {
                let lateness = scheduled.elapsed();
                if is_misfire(lateness, schedule.misfire_grace) {
                    debug!("Job {} misfired by {:?}, waiting for next tick", job.name(), lateness);
                    continue;
                }
                job.try_run().await;
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!("Job {} stopped", job.name());
}

/// Running scheduler; dropping it without `shutdown` leaves the tasks running
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal every job loop to stop and wait for in-flight runs to finish
    pub async fn shutdown(self) {
        if self.shutdown_tx.send(true).is_err() {
            warn!("Scheduler tasks already gone");
        }
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PeriodicJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    struct BlockingJob {
        release: Notify,
        started: Notify,
    }

    #[async_trait]
    impl PeriodicJob for BlockingJob {
        fn name(&self) -> &'static str {
            "blocking"
        }

        async fn run(&self) -> anyhow::Result<()> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[test]
    fn test_misfire_threshold() {
        let grace = Duration::from_secs(5);
        assert!(!is_misfire(Duration::from_secs(5), grace));
        assert!(is_misfire(Duration::from_millis(5001), grace));
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let job = Arc::new(BlockingJob {
            release: Notify::new(),
            started: Notify::new(),
        });
        let guarded = Arc::new(GuardedJob::new(job.clone()));

        let first = tokio::spawn({
            let guarded = guarded.clone();
            async move { guarded.try_run().await }
        });
        job.started.notified().await;

        assert_eq!(guarded.try_run().await, RunOutcome::AlreadyRunning);

        job.release.notify_one();
        assert_eq!(first.await.unwrap(), RunOutcome::Completed);

        // Flag is cleared once the run finishes
        let again = tokio::spawn({
            let guarded = guarded.clone();
            async move { guarded.try_run().await }
        });
        job.started.notified().await;
        job.release.notify_one();
        assert_eq!(again.await.unwrap(), RunOutcome::Completed);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed_and_loop_keeps_ticking() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let mut scheduler = Scheduler::new();
        scheduler.add_job(
            job.clone(),
            JobSchedule::every(Duration::from_millis(10), Duration::from_secs(1)),
        );

        let handle = scheduler.start();
        time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;

        assert!(job.runs.load(Ordering::SeqCst) >= 2);
    }

    struct PanickingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl PeriodicJob for PanickingJob {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn run(&self) -> anyhow::Result<()> {
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first run blew up");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_panicking_run_is_a_failure_and_loop_keeps_ticking() {
        let job = Arc::new(PanickingJob {
            runs: AtomicUsize::new(0),
        });
        let guarded = GuardedJob::new(job.clone());
        assert_eq!(guarded.try_run().await, RunOutcome::Failed);
        assert_eq!(guarded.try_run().await, RunOutcome::Completed);

        let job = Arc::new(PanickingJob {
            runs: AtomicUsize::new(0),
        });
        let mut scheduler = Scheduler::new();
        scheduler.add_job(
            job.clone(),
            JobSchedule::every(Duration::from_millis(10), Duration::from_secs(1)),
        );

        let handle = scheduler.start();
        time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;

        assert!(job.runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_trigger_by_name() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let mut scheduler = Scheduler::new();
        scheduler.add_job(
            job.clone(),
            JobSchedule::every(Duration::from_secs(60), Duration::from_secs(1)),
        );

        assert_eq!(scheduler.trigger("counting").await, Some(RunOutcome::Completed));
        assert_eq!(scheduler.trigger("missing").await, None);
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }
}
