//! Background scheduling of backup cycles.
//!
//! Two kinds of work are managed:
//! - an immediate job, started on demand. Starting another one replaces the
//!   pending job instead of queueing behind it.
//! - a periodic job that runs a cycle every `interval`. Re-scheduling with the
//!   same interval keeps the existing job.
//!
//! Each job retries `Retry` verdicts with exponential backoff. Cancellation
//! only interrupts waits; a cycle that has started always runs to
//! completion, and cycles never overlap.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventtracker_core::backup::ports::LocalStore;
use eventtracker_core::BackupOrchestrator;
use eventtracker_domain::constants::{
    BACKUP_RETRY_INITIAL_SECS, BACKUP_RETRY_MAX_ATTEMPTS, PERIODIC_BACKUP_INTERVAL_SECS,
};
use eventtracker_domain::{BackupConfig, BackupVerdict};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Unit of scheduled work.
#[async_trait]
pub trait BackupJob: Send + Sync + 'static {
    async fn run_backup_cycle(&self) -> BackupVerdict;
}

#[async_trait]
impl<S: LocalStore + 'static> BackupJob for BackupOrchestrator<S> {
    async fn run_backup_cycle(&self) -> BackupVerdict {
        self.backup_cycle().await
    }
}

/// Configuration for the backup scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSchedulerConfig {
    /// Period of the periodic job
    pub interval: Duration,
    /// Delay before the first retry; doubled after each further attempt
    pub retry_initial: Duration,
    /// Upper bound on a single retry delay
    pub retry_max: Duration,
    /// Attempts per job run, including the first
    pub max_attempts: u32,
}

impl Default for BackupSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(PERIODIC_BACKUP_INTERVAL_SECS),
            retry_initial: Duration::from_secs(BACKUP_RETRY_INITIAL_SECS),
            retry_max: Duration::from_secs(5 * 60 * 60),
            max_attempts: BACKUP_RETRY_MAX_ATTEMPTS,
        }
    }
}

impl BackupSchedulerConfig {
    fn retry_delay(&self, retry_number: u32) -> Duration {
        let shift = retry_number.saturating_sub(1).min(16);
        self.retry_initial.saturating_mul(1u32 << shift).min(self.retry_max)
    }
}

struct ScheduledTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    interval: Duration,
}

impl ScheduledTask {
    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Context shared by every spawned job
#[derive(Clone)]
struct JobContext {
    job: Arc<dyn BackupJob>,
    config: BackupSchedulerConfig,
    cycle_gate: Arc<Mutex<()>>,
    verdicts: Arc<watch::Sender<Option<BackupVerdict>>>,
}

/// Scheduler for immediate and periodic backup cycles
pub struct BackupScheduler {
    context: JobContext,
    immediate: Mutex<Option<ScheduledTask>>,
    periodic: Mutex<Option<ScheduledTask>>,
}

impl BackupScheduler {
    pub fn new(job: Arc<dyn BackupJob>, config: BackupSchedulerConfig) -> Self {
        let (verdicts, _) = watch::channel(None);
        Self {
            context: JobContext {
                job,
                config,
                cycle_gate: Arc::new(Mutex::new(())),
                verdicts: Arc::new(verdicts),
            },
            immediate: Mutex::new(None),
            periodic: Mutex::new(None),
        }
    }

    /// Scheduler for the loaded backup settings. The periodic job uses
    /// `periodic_interval_secs` and is started right away when
    /// `daily_enabled` is set.
    pub async fn from_config(job: Arc<dyn BackupJob>, config: &BackupConfig) -> Self {
        let interval = Duration::from_secs(config.periodic_interval_secs.max(1));
        let scheduler =
            Self::new(job, BackupSchedulerConfig { interval, ..BackupSchedulerConfig::default() });
        scheduler.set_daily_enabled(config.daily_enabled).await;
        scheduler
    }

    pub fn config(&self) -> &BackupSchedulerConfig {
        &self.context.config
    }

    /// Final verdict of each finished job run (after retries).
    pub fn subscribe_verdicts(&self) -> watch::Receiver<Option<BackupVerdict>> {
        self.context.verdicts.subscribe()
    }

    /// Start a backup now, replacing any immediate job still pending.
    #[instrument(skip(self))]
    pub async fn run_immediately(&self) {
        let mut slot = self.immediate.lock().await;
        if let Some(previous) = slot.take() {
            if previous.is_active() {
                debug!("scheduler.immediate.replaced");
            }
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let context = self.context.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let verdict = run_with_retry(&context, &token).await;
            if let Some(verdict) = verdict {
                context.verdicts.send_replace(Some(verdict));
            }
        });
        *slot = Some(ScheduledTask { cancel, handle, interval: Duration::ZERO });
        info!("scheduler.immediate.enqueued");
    }

    /// Schedule the periodic job with the configured interval.
    ///
    /// Returns `true` when a job was (re)scheduled, `false` when an active
    /// job with the same interval already exists.
    pub async fn schedule_periodic(&self) -> bool {
        let interval = self.context.config.interval;
        self.schedule_periodic_every(interval).await
    }

    /// Schedule the periodic job, updating an existing one in place.
    #[instrument(skip(self))]
    pub async fn schedule_periodic_every(&self, interval: Duration) -> bool {
        let mut slot = self.periodic.lock().await;
        if let Some(existing) = slot.as_ref() {
            if existing.is_active() && existing.interval == interval {
                debug!("scheduler.periodic.unchanged");
                return false;
            }
        }
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let context = self.context.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            periodic_loop(context, interval, token).await;
        });
        *slot = Some(ScheduledTask { cancel, handle, interval });
        info!(interval_secs = interval.as_secs(), "scheduler.periodic.scheduled");
        true
    }

    /// Cancel the periodic job. A cycle already running is not interrupted.
    #[instrument(skip(self))]
    pub async fn cancel_periodic(&self) {
        if let Some(task) = self.periodic.lock().await.take() {
            task.cancel.cancel();
            info!("scheduler.periodic.cancelled");
        }
    }

    /// Apply the daily backup preference.
    pub async fn set_daily_enabled(&self, enabled: bool) {
        if enabled {
            self.schedule_periodic().await;
        } else {
            self.cancel_periodic().await;
        }
    }

    pub async fn is_periodic_scheduled(&self) -> bool {
        self.periodic.lock().await.as_ref().is_some_and(ScheduledTask::is_active)
    }

    /// Cancel all jobs and wait for running cycles to finish.
    ///
    /// # Errors
    ///
    /// Returns error if a job does not finish within `timeout` or panicked.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, timeout: Duration) -> SchedulerResult<()> {
        let tasks = [self.immediate.lock().await.take(), self.periodic.lock().await.take()];
        for task in tasks.into_iter().flatten() {
            task.cancel.cancel();
            tokio::time::timeout(timeout, task.handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: timeout.as_secs() })??;
        }
        info!("scheduler.stopped");
        Ok(())
    }
}

/// Run one job with retries. `None` when cancelled before a verdict was
/// reached.
async fn run_with_retry(
    context: &JobContext,
    cancel: &CancellationToken,
) -> Option<BackupVerdict> {
    let max_attempts = context.config.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let verdict = {
            let _cycle = tokio::select! {
                _ = cancel.cancelled() => return None,
                guard = context.cycle_gate.lock() => guard,
            };
            if cancel.is_cancelled() {
                return None;
            }
            context.job.run_backup_cycle().await
        };

        match verdict {
            BackupVerdict::Success | BackupVerdict::Failure => return Some(verdict),
            BackupVerdict::Retry if attempt == max_attempts => {
                warn!(attempts = attempt, "scheduler.retry.exhausted");
                return Some(verdict);
            }
            BackupVerdict::Retry => {
                let delay = context.config.retry_delay(attempt);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                debug!(attempt, delay_ms, "scheduler.retry.scheduled");
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    None
}

async fn periodic_loop(context: JobContext, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("scheduler.periodic.loop_cancelled");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let Some(verdict) = run_with_retry(&context, &cancel).await else {
            break;
        };
        context.verdicts.send_replace(Some(verdict));
        if verdict == BackupVerdict::Failure {
            warn!("scheduler.periodic.stopped_on_failure");
            cancel.cancel();
            break;
        }
    }
}
