//! In-memory trend store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TrackerError};
use crate::pipeline::trend::TrendSeries;
use crate::traits::store::TrendStore;
use crate::types::score::DomainRun;
use crate::types::trend::BucketWindow;

/// Per-domain state. `writer` serializes runs; the series is swapped behind
/// an `Arc` so readers keep a consistent snapshot while a run is folded.
struct DomainSlot {
    writer: Mutex<()>,
    series: RwLock<Arc<TrendSeries>>,
    runs: RwLock<RunLog>,
}

/// Append-only run history with an id index and the latest run by `run_at`.
#[derive(Default)]
struct RunLog {
    runs: Vec<DomainRun>,
    ids: HashSet<Uuid>,
    latest: Option<DomainRun>,
}

impl RunLog {
    /// False if the run was already recorded.
    fn insert(&mut self, run: &DomainRun) -> bool {
        if !self.ids.insert(run.run_id) {
            return false;
        }
        // Ties go to the run recorded last
        if self.latest.as_ref().map_or(true, |l| run.run_at >= l.run_at) {
            self.latest = Some(run.clone());
        }
        self.runs.push(run.clone());
        true
    }
}

/// In-memory storage for runs and trend series.
///
/// Useful for tests, the CLI, and hosts that persist elsewhere. Data is lost
/// on restart.
pub struct MemoryTrendStore {
    window: BucketWindow,
    domains: DashMap<String, Arc<DomainSlot>>,
}

impl Default for MemoryTrendStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTrendStore {
    /// Create an empty store bucketing by UTC day.
    pub fn new() -> Self {
        Self::with_window(BucketWindow::DAY)
    }

    /// Create an empty store with a custom bucket width.
    pub fn with_window(window: BucketWindow) -> Self {
        Self {
            window,
            domains: DashMap::new(),
        }
    }

    pub fn window(&self) -> BucketWindow {
        self.window
    }

    /// Domains with at least one recorded run.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.domains.iter().map(|e| e.key().clone()).collect();
        domains.sort();
        domains
    }

    /// Drop all stored data.
    pub fn clear(&self) {
        self.domains.clear();
    }

    fn slot(&self, domain: &str) -> Arc<DomainSlot> {
        // Clone out so no map shard lock is held across an await.
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| {
                Arc::new(DomainSlot {
                    writer: Mutex::new(()),
                    series: RwLock::new(Arc::new(TrendSeries::new(domain, self.window))),
                    runs: RwLock::new(RunLog::default()),
                })
            })
            .clone()
    }

    fn existing(&self, domain: &str) -> Option<Arc<DomainSlot>> {
        self.domains.get(domain).map(|slot| slot.clone())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> TrackerError {
    TrackerError::Storage("trend store lock poisoned".into())
}

#[async_trait]
impl TrendStore for MemoryTrendStore {
    async fn record_run(&self, run: &DomainRun) -> Result<()> {
        let slot = self.slot(&run.domain);
        let _writer = slot.writer.lock().await;

        {
            let mut log = slot.runs.write().map_err(poisoned)?;
            if !log.insert(run) {
                debug!(domain = %run.domain, run_id = %run.run_id, "Run already recorded");
                return Ok(());
            }
        }

        // Copies the series only if a reader still holds the old snapshot.
        let mut series = slot.series.write().map_err(poisoned)?;
        Arc::make_mut(&mut series).fold(run);

        debug!(
            domain = %run.domain,
            run_id = %run.run_id,
            overall = ?run.overall,
            "Recorded run"
        );
        Ok(())
    }

    async fn series(&self, domain: &str) -> Result<Option<Arc<TrendSeries>>> {
        let Some(slot) = self.existing(domain) else {
            return Ok(None);
        };
        let snapshot = slot.series.read().map_err(poisoned)?.clone();
        Ok(Some(snapshot))
    }

    async fn runs(&self, domain: &str) -> Result<Vec<DomainRun>> {
        match self.existing(domain) {
            Some(slot) => {
                let mut runs = slot.runs.read().map_err(poisoned)?.runs.clone();
                runs.sort_by_key(|r| r.run_at);
                Ok(runs)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn latest_run(&self, domain: &str) -> Result<Option<DomainRun>> {
        let Some(slot) = self.existing(domain) else {
            return Ok(None);
        };
        let latest = slot.runs.read().map_err(poisoned)?.latest.clone();
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::batch::BatchState;
    use crate::types::score::Visibility;
    use chrono::{TimeDelta, Utc};

    fn run(domain: &str, score: f64, hours_ago: i64) -> DomainRun {
        let at = Utc::now() - TimeDelta::hours(hours_ago);
        DomainRun {
            run_id: Uuid::now_v7(),
            domain: domain.into(),
            queries: vec![],
            overall: Visibility::Scored(score),
            batch: BatchState::Completed,
            run_at: at,
            window_start: at,
            window_end: at,
        }
    }

    #[tokio::test]
    async fn test_record_and_read() {
        let store = MemoryTrendStore::new();
        store.record_run(&run("example.com", 40.0, 2)).await.unwrap();
        store.record_run(&run("example.com", 60.0, 1)).await.unwrap();
        store.record_run(&run("rival.io", 10.0, 1)).await.unwrap();

        let series = store.series("example.com").await.unwrap().unwrap();
        assert_eq!(series.totals().runs, 2);
        assert_eq!(series.totals().mean(), Some(50.0));
        assert_eq!(store.runs("example.com").await.unwrap().len(), 2);
        assert_eq!(
            store.latest_run("example.com").await.unwrap().unwrap().overall,
            Visibility::Scored(60.0)
        );
        assert_eq!(store.domains(), vec!["example.com".to_string(), "rival.io".to_string()]);
        assert!(store.series("unknown.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_run_ignored() {
        let store = MemoryTrendStore::new();
        let r = run("example.com", 40.0, 0);
        store.record_run(&r).await.unwrap();
        store.record_run(&r).await.unwrap();

        assert_eq!(store.runs("example.com").await.unwrap().len(), 1);
        assert_eq!(store.series("example.com").await.unwrap().unwrap().totals().runs, 1);
    }

    #[tokio::test]
    async fn test_late_arriving_older_run_keeps_latest() {
        let store = MemoryTrendStore::new();
        store.record_run(&run("example.com", 70.0, 1)).await.unwrap();
        store.record_run(&run("example.com", 20.0, 5)).await.unwrap();

        let latest = store.latest_run("example.com").await.unwrap().unwrap();
        assert_eq!(latest.overall, Visibility::Scored(70.0));
        assert_eq!(store.runs("example.com").await.unwrap()[0].overall, Visibility::Scored(20.0));
        assert!(store.latest_run("unknown.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_unaffected_by_later_writes() {
        let store = MemoryTrendStore::new();
        store.record_run(&run("example.com", 40.0, 1)).await.unwrap();
        let snapshot = store.series("example.com").await.unwrap().unwrap();

        store.record_run(&run("example.com", 80.0, 0)).await.unwrap();

        assert_eq!(snapshot.totals().runs, 1);
        assert_eq!(store.series("example.com").await.unwrap().unwrap().totals().runs, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_all_folded() {
        let store = Arc::new(MemoryTrendStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record_run(&run("example.com", i as f64, 0)).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let series = store.series("example.com").await.unwrap().unwrap();
        assert_eq!(series.totals().runs, 50);
        assert_eq!(series.totals().score_sum, (0..50).sum::<i32>() as f64);
    }
}
