//! Competitive standing types.

use serde::{Deserialize, Serialize};

use super::score::Visibility;

/// A competitor's score over the same query set and run window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorSnapshot {
    pub domain: String,
    pub score: Visibility,

    /// `competitor - tracked`; `None` if either side is indeterminate
    pub difference: Option<f64>,

    /// 1-based rank among the tracked domain and all competitors
    pub rank: usize,

    /// `tracked_rank - rank`. Positive means the competitor is ahead.
    pub rank_delta: i64,

    pub citation_count: usize,
}

/// Relative standing of the tracked domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveReport {
    pub tracked_domain: String,
    pub tracked_score: Visibility,
    pub tracked_rank: usize,

    /// Ordered by rank
    pub competitors: Vec<CompetitorSnapshot>,

    /// Tracked domain's share of all citations in the window, 0-100.
    /// `None` when nobody was cited.
    pub share_of_voice: Option<f64>,
}

impl CompetitiveReport {
    /// Competitors scoring above the tracked domain.
    pub fn ahead(&self) -> impl Iterator<Item = &CompetitorSnapshot> {
        self.competitors.iter().filter(|c| c.rank_delta > 0)
    }
}
