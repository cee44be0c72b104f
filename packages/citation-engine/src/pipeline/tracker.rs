//! End-to-end tracking: dispatch, extract, score, record, compare, recommend.
//!
//! One [`VisibilityTracker`] owns the engine set and a trend store. Each
//! tracking request dispatches its queries once; the tracked domain and
//! every competitor are scored against the same answers, so competitor
//! snapshots always share the query set and time window of the tracked run.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::compare::compare;
use super::dispatch::Dispatcher;
use super::extract::CitationExtractor;
use super::recommend::{recommend_for_run, RecommendationContext};
use super::score::Scorer;
use super::trend::{TrendReport, TrendSeries};
use crate::error::{ConfigError, Result};
use crate::traits::store::TrendStore;
use crate::types::batch::{Batch, BatchState, Interruption};
use crate::types::compare::CompetitiveReport;
use crate::types::config::{ExtractorConfig, ScoringConfig, TrendConfig};
use crate::types::domain::{Query, TrackedDomain};
use crate::types::engine::{CallStatus, EngineId};
use crate::types::recommendation::Recommendation;
use crate::types::score::DomainRun;
use crate::types::trend::TrendPoint;

/// One tracking request from the host application.
#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub domain: TrackedDomain,
    pub queries: Vec<Query>,
    pub competitors: Vec<TrackedDomain>,

    /// Overrides the dispatcher's batch deadline
    pub deadline: Option<Duration>,
}

impl TrackRequest {
    pub fn new(domain: TrackedDomain) -> Self {
        Self {
            domain,
            queries: Vec::new(),
            competitors: Vec::new(),
            deadline: None,
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    pub fn with_queries(mut self, queries: impl IntoIterator<Item = Query>) -> Self {
        self.queries.extend(queries);
        self
    }

    pub fn with_competitor(mut self, competitor: TrackedDomain) -> Self {
        self.competitors.push(competitor);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Drop duplicate queries and competitors, and any competitor equal to
    /// the tracked domain. Fails if no query remains.
    fn normalized(mut self) -> std::result::Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        self.queries.retain(|q| seen.insert(q.text.clone()));
        if self.queries.is_empty() {
            return Err(ConfigError::NoQueries);
        }

        let mut seen = HashSet::new();
        seen.insert(self.domain.host().to_string());
        self.competitors.retain(|c| seen.insert(c.host().to_string()));

        Ok(self)
    }
}

/// Batch outcome as shown alongside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub id: Uuid,
    pub state: BatchState,
    pub interrupted: Option<Interruption>,
    pub ok: usize,
    pub timeout: usize,
    pub error: usize,
    pub rate_limited: usize,
    /// Engines without a single `ok` answer
    pub unreachable_engines: Vec<EngineId>,
}

impl From<&Batch> for BatchSummary {
    fn from(batch: &Batch) -> Self {
        Self {
            id: batch.id,
            state: batch.state,
            interrupted: batch.interrupted,
            ok: batch.status_count(CallStatus::Ok),
            timeout: batch.status_count(CallStatus::Timeout),
            error: batch.status_count(CallStatus::Error),
            rate_limited: batch.status_count(CallStatus::RateLimited),
            unreachable_engines: batch.unreachable_engines(),
        }
    }
}

/// Everything a dashboard needs after one tracking request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackReport {
    pub run: DomainRun,
    pub batch: BatchSummary,
    pub competition: Option<CompetitiveReport>,
    pub trend: TrendReport,
    pub recommendations: Vec<Recommendation>,
}

impl TrackReport {
    /// True when no engine produced a usable score ("no data", not zero).
    pub fn is_no_data(&self) -> bool {
        self.run.is_indeterminate()
    }
}

/// Orchestrates tracking runs against a fixed engine set.
pub struct VisibilityTracker<S: TrendStore> {
    dispatcher: Dispatcher,
    scorer: Scorer,
    store: S,
    trend: TrendConfig,
}

impl<S: TrendStore> VisibilityTracker<S> {
    /// Create a tracker. Floor scores come from the engine configs.
    pub fn new(dispatcher: Dispatcher, store: S) -> Self {
        let scoring = ScoringConfig::from_engines(dispatcher.engine_configs());
        Self {
            dispatcher,
            scorer: Scorer::new(CitationExtractor::default(), scoring),
            store,
            trend: TrendConfig::default(),
        }
    }

    /// Set extractor thresholds.
    pub fn with_extractor_config(mut self, config: ExtractorConfig) -> Self {
        self.scorer = Scorer::new(CitationExtractor::new(config), self.scorer.scoring().clone());
        self
    }

    /// Replace the floor-score table.
    pub fn with_scoring_config(mut self, scoring: ScoringConfig) -> Self {
        self.scorer = Scorer::new(self.scorer.extractor().clone(), scoring);
        self
    }

    /// Set trend reporting options.
    pub fn with_trend_config(mut self, config: TrendConfig) -> Self {
        self.trend = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run one tracking request.
    pub async fn track(&self, request: TrackRequest) -> Result<TrackReport> {
        self.track_with_cancel(request, CancellationToken::new()).await
    }

    /// Run one tracking request, abandoning pending engine calls on cancel.
    ///
    /// Per-call failures never fail the request; they show up as statuses in
    /// the batch summary. Only invalid requests and store failures return
    /// an error.
    pub async fn track_with_cancel(
        &self,
        request: TrackRequest,
        cancel: CancellationToken,
    ) -> Result<TrackReport> {
        let request = request.normalized()?;
        if let Some(deadline) = request.deadline {
            self.dispatcher.check_deadline(deadline)?;
        }
        let deadline = request.deadline.or(self.dispatcher.config().batch_deadline);

        info!(
            domain = %request.domain,
            queries = request.queries.len(),
            competitors = request.competitors.len(),
            "Starting tracking run"
        );

        let batch = self
            .dispatcher
            .dispatch_with(&request.queries, deadline, cancel)
            .await;

        let run = self.rescore(&request.domain, &request.queries, &batch);
        let competitor_runs: Vec<DomainRun> = request
            .competitors
            .iter()
            .map(|c| self.rescore(c, &request.queries, &batch))
            .collect();

        let recorded = join_all(
            std::iter::once(&run)
                .chain(competitor_runs.iter())
                .map(|r| self.store.record_run(r)),
        )
        .await;
        for result in recorded {
            result?;
        }

        if run.is_indeterminate() {
            warn!(domain = %run.domain, batch_id = %batch.id, "No engine produced a usable answer; run has no data");
        }

        let now = run.run_at;
        let trend = self.trend(request.domain.host(), now).await?;

        let mut competitor_points: Vec<Vec<TrendPoint>> = Vec::with_capacity(request.competitors.len());
        for competitor in &request.competitors {
            competitor_points.push(self.recent_points(competitor.host(), now).await?);
        }

        let recommendations = {
            let ctx = competitor_points
                .iter()
                .fold(RecommendationContext::new(&trend.points), |ctx, points| {
                    ctx.with_competitor(points)
                });
            recommend_for_run(&run, &ctx)
        };

        let competition = (!competitor_runs.is_empty()).then(|| compare(&run, &competitor_runs));

        info!(
            domain = %run.domain,
            run_id = %run.run_id,
            state = ?run.batch,
            overall = ?run.overall,
            recommendations = recommendations.len(),
            "Tracking run finished"
        );

        Ok(TrackReport {
            batch: BatchSummary::from(&batch),
            run,
            competition,
            trend,
            recommendations,
        })
    }

    /// Score a stored batch for a domain. Pure: the same batch always
    /// yields the same run, including its id.
    pub fn rescore(&self, domain: &TrackedDomain, queries: &[Query], batch: &Batch) -> DomainRun {
        self.scorer.score_run(domain, queries, batch)
    }

    /// Trend report for a domain as of `now`.
    pub async fn trend(&self, domain: &str, now: DateTime<Utc>) -> Result<TrendReport> {
        Ok(self.series(domain).await?.report(now, &self.trend))
    }

    /// Recommendations for a domain's latest recorded run.
    pub async fn recommendations(
        &self,
        domain: &str,
        competitors: &[&str],
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        let Some(run) = self.store.latest_run(domain).await? else {
            return Ok(Vec::new());
        };

        let history = self.recent_points(domain, now).await?;
        let mut competitor_points = Vec::with_capacity(competitors.len());
        for competitor in competitors {
            competitor_points.push(self.recent_points(competitor, now).await?);
        }

        let ctx = competitor_points
            .iter()
            .fold(RecommendationContext::new(&history), |ctx, points| {
                ctx.with_competitor(points)
            });
        Ok(recommend_for_run(&run, &ctx))
    }

    async fn recent_points(&self, domain: &str, now: DateTime<Utc>) -> Result<Vec<TrendPoint>> {
        Ok(self.series(domain).await?.recent(now, self.trend.report_periods))
    }

    /// The domain's series bucketed by the configured window. A store that
    /// buckets differently is rebuilt from its runs.
    async fn series(&self, domain: &str) -> Result<Arc<TrendSeries>> {
        let window = self.trend.window;
        match self.store.series(domain).await? {
            Some(series) if series.window() == window => Ok(series),
            Some(series) => {
                debug!(
                    domain,
                    stored = series.window().seconds(),
                    configured = window.seconds(),
                    "Rebucketing trend series"
                );
                let runs = self.store.runs(domain).await?;
                Ok(Arc::new(TrendSeries::from_runs(domain, window, &runs)))
            }
            None => Ok(Arc::new(TrendSeries::new(domain, window))),
        }
    }
}
