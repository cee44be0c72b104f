//! Recommendation types.

use serde::{Deserialize, Serialize};

use super::engine::EngineId;

/// Urgency of a recommendation. Orders `High` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// What the recommendation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Engine answered but never cited the domain; restructure content
    /// (direct-answer formatting, clear headings, FAQ blocks).
    NotCited,

    /// Cited, but ranked below the top three sources; build authority and depth.
    ImproveRanking,

    /// Own score declining while competitors rise.
    CompetitiveErosion,

    /// Engine never returned a usable answer; check credentials and quotas.
    EngineUnavailable,
}

/// One suggested action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub engine: Option<EngineId>,
    pub title: String,
    pub detail: String,

    /// Coarse estimate of overall-score points the action could recover.
    /// An estimate, not a promise.
    pub expected_impact: f64,
}
