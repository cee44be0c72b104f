//! Normalized scores: per engine, per query, per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use super::batch::BatchState;
use super::citation::CitationEvidence;
use super::domain::Query;
use super::engine::{CallStatus, EngineId};

/// Normalized outcome for one (query, engine) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineScore {
    pub engine: EngineId,

    /// 0-100. A cited score is `round(0.6 * position_score + 0.4 * confidence)`
    /// raised to the engine's floor, so citing never scores below not citing.
    pub score: u8,

    pub cited: bool,
    pub position: Option<u32>,

    /// `Error` when the call failed or the answer could not be interpreted
    pub status: CallStatus,

    pub evidence: CitationEvidence,
}

impl EngineScore {
    /// Whether this engine participates in the query mean.
    pub fn is_counted(&self) -> bool {
        self.status == CallStatus::Ok
    }
}

/// Aggregate score, or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Visibility {
    /// Mean of the contributing scores, 0-100
    Scored(f64),

    /// No engine reached `ok`; the score is withheld rather than reported as 0.
    Indeterminate,
}

impl Visibility {
    /// Mean of the given values, or `Indeterminate` if there are none.
    pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let (sum, count) = values
            .into_iter()
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            Self::Indeterminate
        } else {
            Self::Scored(sum / count as f64)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Scored(v) => Some(v),
            Self::Indeterminate => None,
        }
    }

    pub fn is_indeterminate(self) -> bool {
        matches!(self, Self::Indeterminate)
    }

    /// Order with scored values first (highest first), indeterminate last.
    pub fn cmp_desc(self, other: Self) -> Ordering {
        match (self, other) {
            (Self::Scored(a), Self::Scored(b)) => b.total_cmp(&a),
            (Self::Scored(_), Self::Indeterminate) => Ordering::Less,
            (Self::Indeterminate, Self::Scored(_)) => Ordering::Greater,
            (Self::Indeterminate, Self::Indeterminate) => Ordering::Equal,
        }
    }
}

/// Outcome for one (domain, query, run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityScore {
    pub domain: String,
    pub query: Query,
    pub overall: Visibility,

    /// One entry per configured engine, ordered by engine id
    pub engines: Vec<EngineScore>,

    pub run_at: DateTime<Utc>,
}

impl VisibilityScore {
    /// Engines that cited the domain for this query.
    pub fn citation_count(&self) -> usize {
        self.engines.iter().filter(|e| e.cited).count()
    }

    /// Score for a specific engine.
    pub fn engine(&self, id: &EngineId) -> Option<&EngineScore> {
        self.engines.iter().find(|e| &e.engine == id)
    }
}

/// All query scores for one domain in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRun {
    pub run_id: Uuid,
    pub domain: String,
    pub queries: Vec<VisibilityScore>,

    /// Mean of the scored queries
    pub overall: Visibility,

    pub batch: BatchState,
    pub run_at: DateTime<Utc>,

    /// Time span in which the engine calls of this run were made
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl DomainRun {
    /// Total (query, engine) citations in the run.
    pub fn citation_count(&self) -> usize {
        self.queries.iter().map(|q| q.citation_count()).sum()
    }

    /// Whether the run produced no usable score at all ("no data").
    pub fn is_indeterminate(&self) -> bool {
        self.overall.is_indeterminate()
    }

    /// Best-performing queries.
    ///
    /// Ordered by score (indeterminate last), then citation count, then
    /// query text, so the result is reproducible.
    pub fn top_queries(&self, n: usize) -> Vec<&VisibilityScore> {
        let mut ranked: Vec<&VisibilityScore> = self.queries.iter().collect();
        ranked.sort_by(|a, b| {
            a.overall
                .cmp_desc(b.overall)
                .then_with(|| b.citation_count().cmp(&a.citation_count()))
                .then_with(|| a.query.text.cmp(&b.query.text))
        });
        ranked.truncate(n);
        ranked
    }

    /// Every engine score in the run, across queries.
    pub fn engine_scores(&self) -> impl Iterator<Item = &EngineScore> {
        self.queries.iter().flat_map(|q| q.engines.iter())
    }
}
