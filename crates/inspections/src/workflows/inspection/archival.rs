use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::repository::{InspectionRepository, RepositoryError};
use crate::clock::{Clock, SystemClock};

/// Default retention window a case stays REVIEWED before the sweep archives it.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("a {retention_days}-day retention window from {now} is out of range")]
    WindowOutOfRange {
        now: DateTime<Utc>,
        retention_days: i64,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Sole writer of the ARCHIVED status.
pub struct ArchivalSweep<R> {
    repository: Arc<R>,
    retention: Duration,
    clock: Arc<dyn Clock>,
}

impl<R> ArchivalSweep<R>
where
    R: InspectionRepository + 'static,
{
    pub fn new(repository: Arc<R>, retention: Duration) -> Self {
        Self::with_clock(repository, retention, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<R>, retention: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            retention,
            clock,
        }
    }

    /// Latest `reviewed_at` still kept at `now`; anything strictly older is archived.
    pub fn cutoff_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SweepError> {
        now.checked_sub_signed(self.retention)
            .ok_or(SweepError::WindowOutOfRange {
                now,
                retention_days: self.retention.num_days(),
            })
    }

    /// One set-based pass. Cases archived by an earlier pass no longer match.
    pub fn run_once_at(&self, now: DateTime<Utc>) -> Result<usize, SweepError> {
        let cutoff = self.cutoff_at(now)?;
        let archived = self.repository.archive_reviewed_before(cutoff, now)?;
        if archived > 0 {
            info!(archived, %cutoff, "archived stale reviewed inspections");
        } else {
            debug!(%cutoff, "archival sweep found nothing to archive");
        }
        Ok(archived)
    }

    pub fn run_once(&self) -> Result<usize, SweepError> {
        self.run_once_at(self.clock.now())
    }

    /// Runs the sweep on a fixed period until the returned handle is shut down.
    /// Failures are logged and the next tick tries again.
    pub fn spawn(self, period: StdDuration) -> SweepHandle {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(period_secs = period.as_secs(), "starting archival sweep");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = self.run_once() {
                            error!(error = %err, "archival sweep failed; retrying next tick");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("archival sweep stopped");
        });

        SweepHandle { shutdown, task }
    }
}

/// Control handle for a spawned sweep task.
pub struct SweepHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            error!(error = %err, "archival sweep task ended abnormally");
        }
    }
}
