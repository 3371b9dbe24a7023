//! 自动备份调度
//!
//! Runs `create_backup(auto)` on a fixed period. The period comes from the
//! `backup_interval` setting (minutes), falling back to
//! [`BackupConfig::auto_interval`](super::BackupConfig).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use shared::models::{BackupKind, MAX_BACKUP_INTERVAL_MINUTES, SettingKey, StoreSettings};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::BackupManager;
use crate::db::repository::setting;

const MIN_PERIOD: Duration = Duration::from_millis(1);

fn max_period() -> Duration {
    Duration::from_secs(MAX_BACKUP_INTERVAL_MINUTES * 60)
}

struct RunningSchedule {
    token: CancellationToken,
    handle: JoinHandle<()>,
    period: Duration,
}

/// Auto backup scheduler
///
/// Process-lifetime state only; nothing but the interval setting persists.
pub struct AutoBackup {
    manager: Arc<BackupManager>,
    running: Mutex<Option<RunningSchedule>>,
}

impl AutoBackup {
    pub fn new(manager: Arc<BackupManager>) -> Self {
        Self {
            manager,
            running: Mutex::new(None),
        }
    }

    /// Start (or restart) with the interval read from settings
    ///
    /// Returns the period in use.
    pub async fn start(&self) -> Duration {
        let period = self.resolve_period().await;
        self.start_every(period).await;
        period
    }

    /// Start (or restart) with an explicit period, clamped to
    /// `1ms..=MAX_BACKUP_INTERVAL_MINUTES`
    pub async fn start_every(&self, period: Duration) {
        let bounded = period.clamp(MIN_PERIOD, max_period());
        if bounded != period {
            tracing::warn!(requested = ?period, used = ?bounded, "Auto backup period out of range");
        }
        let period = bounded;

        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            Self::shutdown(previous).await;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_schedule(self.manager.clone(), period, token.clone()));
        tracing::info!(period_secs = period.as_secs(), "Auto backup started");
        *running = Some(RunningSchedule {
            token,
            handle,
            period,
        });
    }

    /// Cancel the schedule and wait for an in-flight backup to finish
    pub async fn stop(&self) {
        if let Some(schedule) = self.running.lock().await.take() {
            Self::shutdown(schedule).await;
            tracing::info!("Auto backup stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Period of the running schedule
    pub async fn period(&self) -> Option<Duration> {
        self.running.lock().await.as_ref().map(|s| s.period)
    }

    async fn shutdown(schedule: RunningSchedule) {
        schedule.token.cancel();
        if let Err(e) = schedule.handle.await {
            tracing::error!(error = %e, "Auto backup task ended abnormally");
        }
    }

    /// Stored `backup_interval` when it validates, else the configured default
    async fn resolve_period(&self) -> Duration {
        let fallback = self.manager.config().auto_interval;
        let pool = match self.manager.db().pool().await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read backup interval, using default");
                return fallback;
            }
        };
        let stored = match setting::get(&pool, SettingKey::BackupInterval.as_str()).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return fallback,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read backup interval, using default");
                return fallback;
            }
        };

        let mut settings = StoreSettings::default();
        match settings.apply(SettingKey::BackupInterval, &stored) {
            Ok(()) => settings.backup_period().unwrap_or(fallback),
            Err(reason) => {
                tracing::warn!(value = %stored, %reason, "Invalid backup_interval setting, using default");
                fallback
            }
        }
    }
}

async fn run_schedule(manager: Arc<BackupManager>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Outside the select: cancellation never interrupts a backup mid-write
        let run = AssertUnwindSafe(manager.create_backup(BackupKind::Auto)).catch_unwind();
        match run.await {
            Ok(Ok(outcome)) => {
                tracing::debug!(backup = %outcome.metadata.name, "Scheduled backup done");
            }
            Ok(Err(e)) => tracing::error!(error = %e, "Scheduled backup failed"),
            Err(_) => tracing::error!("Scheduled backup panicked"),
        }
    }
}
