//! One refresh cycle: scrape, then publish if the result is usable.
//!
//! Failures never reach the scheduler and never touch the published
//! snapshot; API clients keep reading the last good roster.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::SnapshotCache;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::scraper::ScraperError;
use crate::types::{Entry, Snapshot};

pub const REFRESH_JOB_ID: &str = "atualizar_dados";

/// Anything that can produce a full roster in one go.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_roster(&self) -> Result<Vec<Entry>, ScraperError>;
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Published(usize),
    /// Nothing parsed; the previous snapshot stays.
    Empty,
    /// Another refresh was already running.
    Skipped,
    Failed(ScraperError),
}

impl Display for RefreshOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshOutcome::Published(count) => write!(f, "published {} entries", count),
            RefreshOutcome::Empty => write!(f, "no entries extracted"),
            RefreshOutcome::Skipped => write!(f, "skipped, refresh already in progress"),
            RefreshOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Owns the snapshot cache and the source that fills it.
pub struct RosterService {
    source: Box<dyn RosterSource>,
    cache: SnapshotCache,
    refreshing: AtomicBool,
}

/// Clears the single-flight flag even if the refresh future is dropped.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RosterService {
    pub fn new(source: impl RosterSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: SnapshotCache::new(),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Runs one refresh cycle unless one is already in flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("Roster refresh already in progress, skipping");
            return RefreshOutcome::Skipped;
        }
        let _guard = FlightGuard(&self.refreshing);

        log::info!("Starting roster refresh");
        let outcome = match self.source.fetch_roster().await {
            Ok(entries) if entries.is_empty() => {
                log::warn!("No roster entries extracted, keeping previous snapshot");
                RefreshOutcome::Empty
            }
            Ok(entries) => {
                let stored = self.cache.publish(Snapshot::new(entries));
                RefreshOutcome::Published(stored.len())
            }
            Err(e) => {
                log::error!("Roster refresh failed, keeping previous snapshot: {}", e);
                RefreshOutcome::Failed(e)
            }
        };
        log::info!("Roster refresh finished: {}", outcome);
        outcome
    }

    /// Registers the refresh cycle on `scheduler` under [`REFRESH_JOB_ID`],
    /// with an immediate first run.
    pub fn schedule(
        self: &Arc<Self>,
        scheduler: &Scheduler,
        interval: Duration,
    ) -> Result<(), SchedulerError> {
        let service = Arc::clone(self);
        scheduler.add_periodic_task(
            move || {
                let service = Arc::clone(&service);
                async move {
                    service.refresh().await;
                }
            },
            interval,
            REFRESH_JOB_ID,
            true,
        )
    }
}
