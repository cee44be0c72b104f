//! Trend aggregation over a domain's run history.
//!
//! A [`TrendSeries`] keeps running sums per time bucket, so folding a new run
//! touches one bucket and the lifetime totals and never replays history.
//! Rolling queries (growth, streak, moving average) read at most the buckets
//! they span.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::config::TrendConfig;
use crate::types::engine::EngineId;
use crate::types::score::DomainRun;
use crate::types::trend::{
    BucketWindow, EngineBreakdown, Growth, PeriodData, PeriodSummary, TrendPoint,
};

/// Week-over-week growth in citation count.
///
/// `(this - last) / last * 100`. With nothing last week the result is `0`
/// if this week is also empty and [`Growth::NewActivity`] otherwise.
pub fn weekly_growth(this_week: u64, last_week: u64) -> Growth {
    if last_week == 0 {
        if this_week == 0 {
            Growth::Percent(0.0)
        } else {
            Growth::NewActivity
        }
    } else {
        Growth::Percent((this_week as f64 - last_week as f64) / last_week as f64 * 100.0)
    }
}

/// Consecutive periods with citations, most recent first, stopping at the
/// first period without.
pub fn streak<I: IntoIterator<Item = bool>>(flags_most_recent_first: I) -> usize {
    flags_most_recent_first
        .into_iter()
        .take_while(|cited| *cited)
        .count()
}

#[derive(Debug, Clone, Default, PartialEq)]
struct EngineTotals {
    score_sum: f64,
    observations: u64,
    citations: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Bucket {
    runs: u64,
    indeterminate_runs: u64,
    scored_runs: u64,
    score_sum: f64,
    citation_count: u64,
    engines: BTreeMap<EngineId, EngineTotals>,
}

impl Bucket {
    fn mean_score(&self) -> Option<f64> {
        (self.scored_runs > 0).then(|| self.score_sum / self.scored_runs as f64)
    }

    fn summary(&self) -> PeriodSummary {
        PeriodSummary {
            runs: self.runs,
            indeterminate_runs: self.indeterminate_runs,
            mean_score: self.mean_score(),
            citation_count: self.citation_count,
            engines: self
                .engines
                .iter()
                .map(|(engine, totals)| EngineBreakdown {
                    engine: engine.clone(),
                    mean_score: (totals.observations > 0)
                        .then(|| totals.score_sum / totals.observations as f64),
                    citation_count: totals.citations,
                    observations: totals.observations,
                })
                .collect(),
        }
    }
}

/// Lifetime counters for a domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningTotals {
    pub runs: u64,
    pub scored_runs: u64,
    pub score_sum: f64,
    pub citation_count: u64,
}

impl RunningTotals {
    /// Mean overall score across every scored run.
    pub fn mean(&self) -> Option<f64> {
        (self.scored_runs > 0).then(|| self.score_sum / self.scored_runs as f64)
    }
}

/// Bucketed time series of one domain's runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    domain: String,
    window: BucketWindow,
    buckets: BTreeMap<i64, Bucket>,
    totals: RunningTotals,
}

impl TrendSeries {
    /// Empty series.
    pub fn new(domain: impl Into<String>, window: BucketWindow) -> Self {
        Self {
            domain: domain.into(),
            window,
            buckets: BTreeMap::new(),
            totals: RunningTotals::default(),
        }
    }

    /// Rebuild a series from stored runs.
    pub fn from_runs<'a>(
        domain: impl Into<String>,
        window: BucketWindow,
        runs: impl IntoIterator<Item = &'a DomainRun>,
    ) -> Self {
        let mut series = Self::new(domain, window);
        for run in runs {
            series.fold(run);
        }
        series
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn window(&self) -> BucketWindow {
        self.window
    }

    pub fn totals(&self) -> RunningTotals {
        self.totals
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Fold one run into the bucket containing its timestamp.
    ///
    /// Indeterminate runs count as runs but contribute no score.
    pub fn fold(&mut self, run: &DomainRun) {
        let citations = run.citation_count() as u64;
        let bucket = self
            .buckets
            .entry(self.window.index_of(run.run_at))
            .or_default();

        bucket.runs += 1;
        bucket.citation_count += citations;
        match run.overall.value() {
            Some(score) => {
                bucket.scored_runs += 1;
                bucket.score_sum += score;
                self.totals.scored_runs += 1;
                self.totals.score_sum += score;
            }
            None => bucket.indeterminate_runs += 1,
        }

        for score in run.engine_scores() {
            let totals = bucket.engines.entry(score.engine.clone()).or_default();
            if score.is_counted() {
                totals.score_sum += score.score as f64;
                totals.observations += 1;
            }
            if score.cited {
                totals.citations += 1;
            }
        }

        self.totals.runs += 1;
        self.totals.citation_count += citations;
    }

    fn point(&self, index: i64) -> TrendPoint {
        TrendPoint {
            period_start: self.window.start_of(index),
            data: self
                .buckets
                .get(&index)
                .map(|b| PeriodData::Observed(b.summary()))
                .unwrap_or(PeriodData::NoData),
        }
    }

    /// Contiguous points from the bucket of `from` to the bucket of `to`,
    /// inclusive. Empty buckets appear as `NoData`.
    pub fn points(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<TrendPoint> {
        let (start, end) = (self.window.index_of(from), self.window.index_of(to));
        (start..=end).map(|i| self.point(i)).collect()
    }

    /// The last `periods` points, ending with the bucket containing `now`.
    pub fn recent(&self, now: DateTime<Utc>, periods: usize) -> Vec<TrendPoint> {
        let end = self.window.index_of(now);
        let start = end - periods.max(1) as i64 + 1;
        (start..=end).map(|i| self.point(i)).collect()
    }

    fn citations_in(&self, start: i64, end: i64) -> u64 {
        self.buckets
            .range(start..=end)
            .map(|(_, b)| b.citation_count)
            .sum()
    }

    fn mean_in(&self, start: i64, end: i64) -> Option<f64> {
        let (sum, n) = self
            .buckets
            .range(start..=end)
            .fold((0.0, 0u64), |(s, n), (_, b)| (s + b.score_sum, n + b.scored_runs));
        (n > 0).then(|| sum / n as f64)
    }

    /// Bucket index ranges for the week ending at `now` and the week before.
    fn weeks(&self, now: DateTime<Utc>) -> ((i64, i64), (i64, i64)) {
        let width = self.window.periods_in_days(7);
        let end = self.window.index_of(now);
        ((end - width + 1, end), (end - 2 * width + 1, end - width))
    }

    /// Citation growth of the last seven days over the seven before.
    pub fn weekly_growth(&self, now: DateTime<Utc>) -> Growth {
        let (this, last) = self.weeks(now);
        weekly_growth(
            self.citations_in(this.0, this.1),
            self.citations_in(last.0, last.1),
        )
    }

    /// Change in mean score between the last two seven-day windows.
    pub fn week_over_week_delta(&self, now: DateTime<Utc>) -> Option<f64> {
        let (this, last) = self.weeks(now);
        Some(self.mean_in(this.0, this.1)? - self.mean_in(last.0, last.1)?)
    }

    /// Mean score in the bucket of `now` minus the one `periods_back` earlier.
    pub fn score_change(&self, now: DateTime<Utc>, periods_back: i64) -> Option<f64> {
        let end = self.window.index_of(now);
        let current = self.buckets.get(&end)?.mean_score()?;
        let earlier = self.buckets.get(&(end - periods_back))?.mean_score()?;
        Some(current - earlier)
    }

    /// Consecutive periods with at least one citation, walking back from now.
    ///
    /// A current period with no runs yet does not break the streak; the walk
    /// starts from the previous period instead.
    pub fn streak(&self, now: DateTime<Utc>) -> usize {
        let Some(&earliest) = self.buckets.keys().next() else {
            return 0;
        };
        let mut start = self.window.index_of(now);
        if !self.buckets.contains_key(&start) {
            start -= 1;
        }
        if start < earliest {
            return 0;
        }
        streak((earliest..=start).rev().map(|i| {
            self.buckets
                .get(&i)
                .map(|b| b.citation_count > 0)
                .unwrap_or(false)
        }))
    }

    /// Mean of the per-period means over the last `periods` periods, skipping
    /// periods without a score.
    pub fn moving_average(&self, now: DateTime<Utc>, periods: usize) -> Option<f64> {
        let end = self.window.index_of(now);
        let start = end - periods.max(1) as i64 + 1;
        let (sum, n) = self
            .buckets
            .range(start..=end)
            .filter_map(|(_, b)| b.mean_score())
            .fold((0.0, 0usize), |(s, n), m| (s + m, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Summary of the series as of `now`.
    pub fn report(&self, now: DateTime<Utc>, config: &TrendConfig) -> TrendReport {
        TrendReport {
            domain: self.domain.clone(),
            points: self.recent(now, config.report_periods),
            weekly_growth: self.weekly_growth(now),
            streak: self.streak(now),
            moving_average: self.moving_average(now, config.moving_average_periods),
            week_over_week_delta: self.week_over_week_delta(now),
            lifetime_mean: self.totals.mean(),
            lifetime_runs: self.totals.runs,
        }
    }
}

/// Trend view for a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub domain: String,
    /// Contiguous, oldest first
    pub points: Vec<TrendPoint>,
    pub weekly_growth: Growth,
    pub streak: usize,
    pub moving_average: Option<f64>,
    pub week_over_week_delta: Option<f64>,
    pub lifetime_mean: Option<f64>,
    pub lifetime_runs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::batch::BatchState;
    use crate::types::citation::CitationEvidence;
    use crate::types::domain::Query;
    use crate::types::engine::CallStatus;
    use crate::types::score::{EngineScore, Visibility, VisibilityScore};
    use chrono::{TimeDelta, TimeZone};
    use uuid::Uuid;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + TimeDelta::days(n)
    }

    fn run(at: DateTime<Utc>, overall: Option<f64>, cited: bool) -> DomainRun {
        let evidence = if cited {
            CitationEvidence::structured(1, 90, "https://example.com")
        } else {
            CitationEvidence::not_cited()
        };
        let engine = EngineScore {
            engine: EngineId::new("perplexity"),
            score: overall.unwrap_or(0.0) as u8,
            cited,
            position: cited.then_some(1),
            status: if overall.is_some() {
                CallStatus::Ok
            } else {
                CallStatus::Timeout
            },
            evidence,
        };
        let visibility = overall.map(Visibility::Scored).unwrap_or(Visibility::Indeterminate);
        DomainRun {
            run_id: Uuid::now_v7(),
            domain: "example.com".into(),
            queries: vec![VisibilityScore {
                domain: "example.com".into(),
                query: Query::new("best crm").unwrap(),
                overall: visibility,
                engines: vec![engine],
                run_at: at,
            }],
            overall: visibility,
            batch: BatchState::Completed,
            run_at: at,
            window_start: at,
            window_end: at,
        }
    }

    fn series(runs: &[DomainRun]) -> TrendSeries {
        TrendSeries::from_runs("example.com", BucketWindow::DAY, runs)
    }

    #[test]
    fn test_weekly_growth_edge_cases() {
        assert_eq!(weekly_growth(0, 0), Growth::Percent(0.0));
        assert_eq!(weekly_growth(5, 0), Growth::NewActivity);
        assert_eq!(weekly_growth(15, 10), Growth::Percent(50.0));
        assert_eq!(weekly_growth(0, 4), Growth::Percent(-100.0));
    }

    #[test]
    fn test_streak_stops_at_first_gap() {
        assert_eq!(streak([true, true, false, true]), 2);
        assert_eq!(streak([false, true]), 0);
        assert_eq!(streak(Vec::<bool>::new()), 0);
    }

    #[test]
    fn test_points_are_contiguous_with_no_data() {
        let s = series(&[run(day(0), Some(80.0), true), run(day(3), Some(40.0), false)]);
        let points = s.points(day(0), day(3));

        assert_eq!(points.len(), 4);
        assert_eq!(points[0].mean_score(), Some(80.0));
        assert_eq!(points[1].data, PeriodData::NoData);
        assert_eq!(points[2].data, PeriodData::NoData);
        assert_eq!(points[3].mean_score(), Some(40.0));
        assert_eq!(points[1].period_start - points[0].period_start, TimeDelta::days(1));
    }

    #[test]
    fn test_indeterminate_run_is_not_zero() {
        let s = series(&[run(day(0), None, false)]);
        let points = s.recent(day(0), 1);
        let summary = points[0].summary().unwrap();

        assert_eq!(summary.runs, 1);
        assert_eq!(summary.indeterminate_runs, 1);
        assert_eq!(summary.mean_score, None);
        assert_eq!(summary.engines[0].mean_score, None);
        assert_eq!(s.totals().mean(), None);
    }

    #[test]
    fn test_same_bucket_runs_are_averaged() {
        let morning = day(0) - TimeDelta::hours(6);
        let s = series(&[run(morning, Some(60.0), true), run(day(0), Some(80.0), true)]);
        let summary = s.recent(day(0), 1)[0].summary().cloned().unwrap();

        assert_eq!(summary.runs, 2);
        assert_eq!(summary.mean_score, Some(70.0));
        assert_eq!(summary.citation_count, 2);
        assert_eq!(summary.engines[0].observations, 2);
    }

    #[test]
    fn test_series_streak() {
        // cited on days 0, 2, 3 and 4; nothing on day 1
        let runs: Vec<DomainRun> = [0, 2, 3, 4]
            .iter()
            .map(|d| run(day(*d), Some(50.0), true))
            .collect();
        let s = series(&runs);

        assert_eq!(s.streak(day(4)), 3);
        // today has no run yet: count from yesterday
        assert_eq!(s.streak(day(5)), 3);
        // a whole empty day breaks it
        assert_eq!(s.streak(day(6)), 0);
    }

    #[test]
    fn test_uncited_day_breaks_streak() {
        let s = series(&[
            run(day(0), Some(50.0), true),
            run(day(1), Some(0.0), false),
            run(day(2), Some(50.0), true),
        ]);
        assert_eq!(s.streak(day(2)), 1);
    }

    #[test]
    fn test_series_weekly_growth() {
        let mut runs = vec![run(day(0), Some(50.0), true), run(day(1), Some(50.0), true)];
        runs.extend((7..10).map(|d| run(day(d), Some(70.0), true)));
        let s = series(&runs);

        // days 7..=13 hold 3 citations, days 0..=6 hold 2
        assert_eq!(s.weekly_growth(day(13)), Growth::Percent(50.0));
        assert_eq!(s.week_over_week_delta(day(13)), Some(20.0));
        assert_eq!(s.weekly_growth(day(6)), Growth::NewActivity);
        assert_eq!(s.weekly_growth(day(40)), Growth::Percent(0.0));
    }

    #[test]
    fn test_moving_average_and_score_change() {
        let s = series(&[
            run(day(0), Some(30.0), true),
            run(day(1), Some(60.0), true),
            run(day(3), Some(90.0), true),
        ]);
        assert_eq!(s.moving_average(day(3), 7), Some(60.0));
        assert_eq!(s.moving_average(day(3), 1), Some(90.0));
        assert_eq!(s.score_change(day(3), 3), Some(60.0));
        assert_eq!(s.score_change(day(3), 1), None);
    }

    #[test]
    fn test_incremental_fold_matches_rebuild() {
        let runs: Vec<DomainRun> = (0..20)
            .map(|d| run(day(d % 9), (d % 4 != 0).then_some((d * 5) as f64), d % 3 == 0))
            .collect();

        let mut incremental = TrendSeries::new("example.com", BucketWindow::DAY);
        for r in &runs {
            incremental.fold(r);
        }
        assert_eq!(incremental, series(&runs));
        assert_eq!(incremental.totals().runs, 20);
    }

    #[test]
    fn test_report_on_empty_series() {
        let s = TrendSeries::new("example.com", BucketWindow::DAY);
        let report = s.report(day(0), &TrendConfig::default());

        assert_eq!(report.points.len(), 30);
        assert!(report.points.iter().all(|p| p.data == PeriodData::NoData));
        assert_eq!(report.weekly_growth, Growth::Percent(0.0));
        assert_eq!(report.streak, 0);
        assert_eq!(report.lifetime_mean, None);
    }
}
