//! Competitive comparison of a tracked domain against competitor runs.
//!
//! Competitor runs are only compared when they cover the same query set and
//! fall inside the tracked run's time window; anything else is skipped so a
//! report never mixes answers captured under different engine behavior.

use std::collections::BTreeSet;
use tracing::warn;

use crate::types::compare::{CompetitiveReport, CompetitorSnapshot};
use crate::types::score::{DomainRun, Visibility};

/// Whether a competitor run can be compared with the tracked run.
pub fn is_comparable(tracked: &DomainRun, competitor: &DomainRun) -> bool {
    let query_set = |run: &DomainRun| -> BTreeSet<String> {
        run.queries.iter().map(|q| q.query.text.clone()).collect()
    };

    query_set(tracked) == query_set(competitor)
        && competitor.window_start >= tracked.window_start
        && competitor.window_end <= tracked.window_end
}

/// Rank the tracked domain among its competitors.
///
/// Ordering: score (indeterminate last), then citation count, then domain
/// name. `difference` is `competitor - tracked` and is `None` when either
/// side has no score.
pub fn compare(tracked: &DomainRun, competitors: &[DomainRun]) -> CompetitiveReport {
    let comparable: Vec<&DomainRun> = competitors
        .iter()
        .filter(|c| {
            let ok = c.domain != tracked.domain && is_comparable(tracked, c);
            if !ok {
                warn!(
                    tracked = %tracked.domain,
                    competitor = %c.domain,
                    "Skipping competitor run with a different query set or window"
                );
            }
            ok
        })
        .collect();

    let mut ranked: Vec<&DomainRun> = std::iter::once(tracked).chain(comparable.iter().copied()).collect();
    ranked.sort_by(|a, b| {
        a.overall
            .cmp_desc(b.overall)
            .then_with(|| b.citation_count().cmp(&a.citation_count()))
            .then_with(|| a.domain.cmp(&b.domain))
    });

    let rank_of = |domain: &str| ranked.iter().position(|r| r.domain == domain).unwrap_or(0) + 1;
    let tracked_rank = rank_of(&tracked.domain);

    let mut snapshots: Vec<CompetitorSnapshot> = comparable
        .iter()
        .map(|c| {
            let rank = rank_of(&c.domain);
            CompetitorSnapshot {
                domain: c.domain.clone(),
                score: c.overall,
                difference: difference(tracked.overall, c.overall),
                rank,
                rank_delta: tracked_rank as i64 - rank as i64,
                citation_count: c.citation_count(),
            }
        })
        .collect();
    snapshots.sort_by_key(|s| s.rank);

    let total_citations: usize =
        tracked.citation_count() + snapshots.iter().map(|s| s.citation_count).sum::<usize>();
    let share_of_voice =
        (total_citations > 0).then(|| tracked.citation_count() as f64 / total_citations as f64 * 100.0);

    CompetitiveReport {
        tracked_domain: tracked.domain.clone(),
        tracked_score: tracked.overall,
        tracked_rank,
        competitors: snapshots,
        share_of_voice,
    }
}

fn difference(tracked: Visibility, competitor: Visibility) -> Option<f64> {
    Some(competitor.value()? - tracked.value()?)
}
