//! Storage trait for run history and trend series.
//!
//! Runs are append-only. Each domain's series is written by at most one run
//! at a time; readers get an immutable snapshot and never wait on a fold.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::pipeline::trend::TrendSeries;
use crate::types::score::DomainRun;

/// Persistence for scored runs and their derived trend series.
#[async_trait]
pub trait TrendStore: Send + Sync {
    /// Append a run and fold it into the domain's series.
    ///
    /// Concurrent calls for the same domain are serialized.
    async fn record_run(&self, run: &DomainRun) -> Result<()>;

    /// Snapshot of a domain's series, if any run was recorded.
    async fn series(&self, domain: &str) -> Result<Option<Arc<TrendSeries>>>;

    /// All recorded runs for a domain, oldest first.
    async fn runs(&self, domain: &str) -> Result<Vec<DomainRun>>;

    /// Most recent run for a domain.
    async fn latest_run(&self, domain: &str) -> Result<Option<DomainRun>> {
        Ok(self.runs(domain).await?.into_iter().max_by_key(|r| r.run_at))
    }
}
