//! Recommendation rules.
//!
//! A pure function of the latest scores plus optional trend history. Each
//! engine emits at most one of "not cited" / "improve ranking"; the erosion
//! rule looks at the series as a whole.

use std::collections::BTreeMap;

use super::score::position_score;
use crate::types::engine::EngineId;
use crate::types::recommendation::{Priority, Recommendation, RecommendationKind};
use crate::types::score::{DomainRun, VisibilityScore};
use crate::types::trend::TrendPoint;

/// Rank at or above which a citation is considered prominent.
const TARGET_POSITION: u32 = 3;

/// Confidence assumed for a fresh citation when estimating impact.
const TARGET_CONFIDENCE: f64 = 60.0;

/// History used by the trend rules.
#[derive(Debug, Clone, Default)]
pub struct RecommendationContext<'a> {
    /// Tracked domain's points, oldest first
    pub history: &'a [TrendPoint],

    /// One series per competitor, oldest first
    pub competitor_histories: Vec<&'a [TrendPoint]>,
}

impl<'a> RecommendationContext<'a> {
    pub fn new(history: &'a [TrendPoint]) -> Self {
        Self {
            history,
            competitor_histories: Vec::new(),
        }
    }

    pub fn with_competitor(mut self, history: &'a [TrendPoint]) -> Self {
        self.competitor_histories.push(history);
        self
    }
}

#[derive(Debug, Default)]
struct EngineStats {
    counted: usize,
    failed: usize,
    cited: usize,
    score_sum: f64,
    cited_score_sum: f64,
    confidence_sum: f64,
    positions: Vec<u32>,
}

impl EngineStats {
    fn mean_score(&self) -> f64 {
        self.score_sum / self.counted.max(1) as f64
    }

    fn mean_cited_score(&self) -> f64 {
        self.cited_score_sum / self.cited.max(1) as f64
    }

    fn mean_confidence(&self) -> f64 {
        self.confidence_sum / self.cited.max(1) as f64
    }

    fn mean_position(&self) -> Option<f64> {
        (!self.positions.is_empty())
            .then(|| self.positions.iter().sum::<u32>() as f64 / self.positions.len() as f64)
    }
}

/// Recommendations for a run.
pub fn recommend_for_run(run: &DomainRun, ctx: &RecommendationContext<'_>) -> Vec<Recommendation> {
    recommend(&run.queries, ctx)
}

/// Recommendations for a set of query scores, ordered by priority then
/// expected impact.
pub fn recommend(scores: &[VisibilityScore], ctx: &RecommendationContext<'_>) -> Vec<Recommendation> {
    let mut stats: BTreeMap<EngineId, EngineStats> = BTreeMap::new();
    for score in scores.iter().flat_map(|s| s.engines.iter()) {
        let entry = stats.entry(score.engine.clone()).or_default();
        if !score.is_counted() {
            entry.failed += 1;
            continue;
        }
        entry.counted += 1;
        entry.score_sum += score.score as f64;
        if score.cited {
            entry.cited += 1;
            entry.cited_score_sum += score.score as f64;
            entry.confidence_sum += score.evidence.confidence as f64;
            if let Some(position) = score.position {
                entry.positions.push(position);
            }
        }
    }

    // Overall scores average over answering engines, so closing one engine's
    // gap moves the overall by gap / answering.
    let answering = stats.values().filter(|s| s.counted > 0).count().max(1) as f64;

    let mut recommendations: Vec<Recommendation> = stats
        .iter()
        .filter_map(|(engine, s)| engine_rule(engine, s, answering))
        .collect();

    recommendations.extend(erosion_rule(ctx));

    recommendations.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.expected_impact.total_cmp(&a.expected_impact))
            .then_with(|| a.engine.cmp(&b.engine))
    });
    recommendations
}

fn engine_rule(engine: &EngineId, s: &EngineStats, answering: f64) -> Option<Recommendation> {
    if s.counted == 0 {
        return (s.failed > 0).then(|| Recommendation {
            kind: RecommendationKind::EngineUnavailable,
            priority: Priority::Low,
            engine: Some(engine.clone()),
            title: format!("{} returned no usable answers", engine),
            detail: "Every call failed or timed out, so visibility on this engine is unknown. \
                     Check credentials, quotas and rate limits."
                .to_string(),
            expected_impact: 0.0,
        });
    }

    if s.cited == 0 {
        let gap = (target_score(TARGET_CONFIDENCE) - s.mean_score()).max(0.0);
        return Some(Recommendation {
            kind: RecommendationKind::NotCited,
            priority: Priority::High,
            engine: Some(engine.clone()),
            title: format!("Not cited by {}", engine),
            detail: format!(
                "{} answered {} of your queries without citing your site. Restructure key pages \
                 for direct answers: lead with a concise answer, use clear headings and add \
                 FAQ-style sections.",
                engine, s.counted
            ),
            expected_impact: round1(gap / answering),
        });
    }

    let mean_position = s.mean_position()?;
    if mean_position > TARGET_POSITION as f64 {
        let gap = (target_score(s.mean_confidence()) - s.mean_cited_score()).max(0.0);
        return Some(Recommendation {
            kind: RecommendationKind::ImproveRanking,
            priority: Priority::Medium,
            engine: Some(engine.clone()),
            title: format!("Improve ranking on {}", engine),
            detail: format!(
                "{} cites your site at an average position of {:.1}. Strengthen authority and \
                 depth (original data, expert sourcing, inbound references) to move into the \
                 top {}.",
                engine, mean_position, TARGET_POSITION
            ),
            expected_impact: round1(gap / answering),
        });
    }

    None
}

/// Score a citation at the target rank would earn.
fn target_score(confidence: f64) -> f64 {
    (0.6 * position_score(TARGET_POSITION) as f64 + 0.4 * confidence).round()
}

/// Change between the last two periods that have a score.
fn last_change(points: &[TrendPoint]) -> Option<f64> {
    let mut means = points.iter().rev().filter_map(|p| p.mean_score());
    let latest = means.next()?;
    let previous = means.next()?;
    Some(latest - previous)
}

fn erosion_rule(ctx: &RecommendationContext<'_>) -> Option<Recommendation> {
    let change = last_change(ctx.history)?;
    if change >= 0.0 {
        return None;
    }

    let best_rise = ctx
        .competitor_histories
        .iter()
        .filter_map(|h| last_change(h))
        .filter(|c| *c > 0.0)
        .max_by(|a, b| a.total_cmp(b))?;

    Some(Recommendation {
        kind: RecommendationKind::CompetitiveErosion,
        priority: Priority::High,
        engine: None,
        title: "Losing ground to competitors".to_string(),
        detail: format!(
            "Your score fell {:.1} points over the last two periods while a competitor gained \
             {:.1}. Review the pages competitors are being cited for and close the gaps.",
            -change, best_rise
        ),
        expected_impact: round1(-change + best_rise),
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
