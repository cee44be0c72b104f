//! Time-series types for longitudinal visibility.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::engine::EngineId;

/// Fixed-width bucketing of run timestamps.
///
/// Buckets are aligned to the Unix epoch, so a one-day window matches UTC
/// calendar days. Deserializing a non-positive width is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBucketWindow")]
pub struct BucketWindow {
    seconds: i64,
}

#[derive(Deserialize)]
struct RawBucketWindow {
    seconds: i64,
}

impl TryFrom<RawBucketWindow> for BucketWindow {
    type Error = String;

    fn try_from(raw: RawBucketWindow) -> Result<Self, Self::Error> {
        if raw.seconds <= 0 {
            return Err(format!("bucket window must be positive, got {} seconds", raw.seconds));
        }
        Ok(Self { seconds: raw.seconds })
    }
}

impl BucketWindow {
    pub const DAY: Self = Self { seconds: 86_400 };
    pub const HOUR: Self = Self { seconds: 3_600 };

    /// A custom window. Non-positive widths fall back to one second.
    pub fn from_seconds(seconds: i64) -> Self {
        Self {
            seconds: seconds.max(1),
        }
    }

    pub fn seconds(self) -> i64 {
        self.seconds
    }

    pub fn width(self) -> TimeDelta {
        TimeDelta::seconds(self.seconds)
    }

    /// Index of the bucket containing `at`.
    pub fn index_of(self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.seconds)
    }

    /// Start of the bucket with the given index.
    pub fn start_of(self, index: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(index.saturating_mul(self.seconds), 0).unwrap_or_default()
    }

    /// Number of buckets covering `days` days (at least one).
    pub fn periods_in_days(self, days: i64) -> i64 {
        (days * 86_400 / self.seconds).max(1)
    }
}

impl Default for BucketWindow {
    fn default() -> Self {
        Self::DAY
    }
}

/// Per-engine slice of a trend bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineBreakdown {
    pub engine: EngineId,

    /// Mean of the engine's counted scores, `None` if it never reached `ok`
    pub mean_score: Option<f64>,

    pub citation_count: u64,

    /// Counted (query, engine) observations
    pub observations: u64,
}

/// Aggregate of the runs that fell into one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub runs: u64,

    /// Runs that produced no usable score
    pub indeterminate_runs: u64,

    /// Mean of scored run overalls; `None` when every run was indeterminate
    pub mean_score: Option<f64>,

    pub citation_count: u64,

    /// Ordered by engine id
    pub engines: Vec<EngineBreakdown>,
}

/// Bucket contents. An empty bucket is explicit, never omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodData {
    NoData,
    Observed(PeriodSummary),
}

/// One time bucket of a domain's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period_start: DateTime<Utc>,
    pub data: PeriodData,
}

impl TrendPoint {
    pub fn summary(&self) -> Option<&PeriodSummary> {
        match &self.data {
            PeriodData::Observed(s) => Some(s),
            PeriodData::NoData => None,
        }
    }

    pub fn mean_score(&self) -> Option<f64> {
        self.summary().and_then(|s| s.mean_score)
    }

    pub fn citation_count(&self) -> u64 {
        self.summary().map(|s| s.citation_count).unwrap_or(0)
    }

    pub fn has_citations(&self) -> bool {
        self.citation_count() > 0
    }
}

/// Week-over-week change in citation count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Growth {
    /// Percentage change; 0 when both weeks are empty
    Percent(f64),

    /// Citations this week after none last week
    NewActivity,
}
