//! Score calculation.
//!
//! Every function here is pure: the same engine results and floor config
//! always produce the same scores, so stored batches can be rescored at will.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::extract::CitationExtractor;
use crate::types::batch::{Batch, BatchState};
use crate::types::citation::{CitationEvidence, EvidenceBasis};
use crate::types::config::ScoringConfig;
use crate::types::domain::{Query, TrackedDomain};
use crate::types::engine::{CallStatus, EngineId, EngineResult};
use crate::types::score::{DomainRun, EngineScore, Visibility, VisibilityScore};

const POSITION_WEIGHT: f64 = 0.6;
const CONFIDENCE_WEIGHT: f64 = 0.4;

/// Prominence of a source rank: 100 at rank 1, minus 10 per rank, 0 from
/// rank 11 on.
pub fn position_score(position: u32) -> u8 {
    let penalty = position.saturating_sub(1).saturating_mul(10);
    100u32.saturating_sub(penalty) as u8
}

/// Score one engine's evidence.
///
/// Cited: `round(0.6 * positionScore + 0.4 * confidence)`, never below the
/// engine's floor. A text mention has no rank and gets a position score of 0.
/// Not cited: the floor, except for an explicitly empty source list (0).
/// Unknown evidence scores 0 with `Error` status and is left out of means.
pub fn score_engine(
    engine: &EngineId,
    call_status: CallStatus,
    evidence: &CitationEvidence,
    config: &ScoringConfig,
) -> EngineScore {
    let floor = config.floor_for(engine);

    let (score, status) = match evidence.basis {
        EvidenceBasis::Unknown => {
            let status = if call_status == CallStatus::Ok {
                // answered, but nothing usable
                CallStatus::Error
            } else {
                call_status
            };
            (0, status)
        }
        EvidenceBasis::EmptySourceList => (0, CallStatus::Ok),
        EvidenceBasis::NotCited => (floor, CallStatus::Ok),
        EvidenceBasis::StructuredSource | EvidenceBasis::TextMention => {
            let prominence = evidence.position.map(position_score).unwrap_or(0) as f64;
            let raw = POSITION_WEIGHT * prominence + CONFIDENCE_WEIGHT * evidence.confidence as f64;
            ((raw.round() as u8).min(100).max(floor), CallStatus::Ok)
        }
    };

    EngineScore {
        engine: engine.clone(),
        score,
        cited: evidence.cited,
        position: evidence.position.filter(|_| evidence.cited),
        status,
        evidence: evidence.clone(),
    }
}

/// Turns engine results into visibility scores.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    extractor: CitationExtractor,
    scoring: ScoringConfig,
}

impl Scorer {
    pub fn new(extractor: CitationExtractor, scoring: ScoringConfig) -> Self {
        Self { extractor, scoring }
    }

    pub fn extractor(&self) -> &CitationExtractor {
        &self.extractor
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Score one query from the final results of its engine set.
    ///
    /// Arrival order does not matter; engines are reported sorted by id.
    pub fn score_query<'a>(
        &self,
        domain: &TrackedDomain,
        query: &Query,
        results: impl IntoIterator<Item = &'a EngineResult>,
        run_at: DateTime<Utc>,
    ) -> VisibilityScore {
        let mut engines: Vec<EngineScore> = results
            .into_iter()
            .map(|result| {
                let evidence = self.extractor.extract(domain, result);
                score_engine(&result.engine, result.status(), &evidence, &self.scoring)
            })
            .collect();
        engines.sort_by(|a, b| a.engine.cmp(&b.engine));

        let overall = Visibility::mean(
            engines
                .iter()
                .filter(|e| e.is_counted())
                .map(|e| e.score as f64),
        );

        debug!(
            domain = %domain,
            query = %query,
            overall = ?overall,
            engines = engines.len(),
            "Scored query"
        );

        VisibilityScore {
            domain: domain.host().to_string(),
            query: query.clone(),
            overall,
            engines,
            run_at,
        }
    }

    /// Score every query of a batch for one domain.
    ///
    /// The run id is derived from the batch id and domain, so rescoring the
    /// same batch yields an identical run.
    pub fn score_run(&self, domain: &TrackedDomain, queries: &[Query], batch: &Batch) -> DomainRun {
        let run_at = batch.finished_at;
        let scores: Vec<VisibilityScore> = queries
            .iter()
            .map(|q| self.score_query(domain, q, batch.results_for(&q.text), run_at))
            .collect();

        let overall = Visibility::mean(scores.iter().filter_map(|s| s.overall.value()));

        // A run with every query indeterminate is "no data", whatever the
        // batch managed.
        let state = if overall.is_indeterminate() && batch.state.is_terminal() {
            BatchState::Failed
        } else {
            batch.state
        };

        DomainRun {
            run_id: Uuid::new_v5(&batch.id, domain.host().as_bytes()),
            domain: domain.host().to_string(),
            queries: scores,
            overall,
            batch: state,
            run_at,
            window_start: batch.started_at,
            window_end: batch.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::engine::{CallOutcome, RawAnswer};
    use proptest::prelude::*;

    fn id(s: &str) -> EngineId {
        EngineId::new(s)
    }

    #[test]
    fn test_position_score() {
        assert_eq!(position_score(1), 100);
        assert_eq!(position_score(2), 90);
        assert_eq!(position_score(10), 10);
        assert_eq!(position_score(11), 0);
        assert_eq!(position_score(u32::MAX), 0);
    }

    #[test]
    fn test_rank_two_confidence_eighty() {
        let evidence = CitationEvidence::structured(2, 80, "https://example.com");
        let score = score_engine(&id("a"), CallStatus::Ok, &evidence, &ScoringConfig::new());
        assert_eq!(score.score, 86);
        assert_eq!(score.position, Some(2));
        assert!(score.cited);
    }

    #[test]
    fn test_not_cited_gets_floor_unless_empty_sources() {
        let config = ScoringConfig::new().with_floor("perplexity", 15);
        let not_cited = score_engine(
            &id("perplexity"),
            CallStatus::Ok,
            &CitationEvidence::not_cited(),
            &config,
        );
        assert_eq!(not_cited.score, 15);
        assert!(not_cited.position.is_none());

        let empty = score_engine(
            &id("perplexity"),
            CallStatus::Ok,
            &CitationEvidence::empty_source_list(),
            &config,
        );
        assert_eq!(empty.score, 0);
        assert!(empty.is_counted());
    }

    #[test]
    fn test_text_mention_uses_confidence_only() {
        let evidence = CitationEvidence::text_mention(40, "example.com");
        let score = score_engine(&id("a"), CallStatus::Ok, &evidence, &ScoringConfig::new());
        assert_eq!(score.score, 16);

        let floored = score_engine(
            &id("a"),
            CallStatus::Ok,
            &evidence,
            &ScoringConfig::new().with_floor("a", 30),
        );
        assert_eq!(floored.score, 30);
    }

    #[test]
    fn test_unknown_evidence_not_counted() {
        let timeout = score_engine(
            &id("a"),
            CallStatus::Timeout,
            &CitationEvidence::unknown(),
            &ScoringConfig::new().with_floor("a", 20),
        );
        assert_eq!(timeout.status, CallStatus::Timeout);
        assert_eq!(timeout.score, 0);
        assert!(!timeout.is_counted());

        let malformed = score_engine(&id("a"), CallStatus::Ok, &CitationEvidence::unknown(), &ScoringConfig::new());
        assert_eq!(malformed.status, CallStatus::Error);
        assert!(!malformed.is_counted());
    }

    #[test]
    fn test_query_mean_excludes_failed_engines() {
        let domain = TrackedDomain::parse("example.com").unwrap();
        let query = Query::new("best crm").unwrap();
        let long = "word ".repeat(50);
        let results = vec![
            EngineResult::new(id("c"), "best crm", CallOutcome::Timeout),
            EngineResult::new(
                id("a"),
                "best crm",
                CallOutcome::Ok(RawAnswer::text(long).with_source_urls(&["https://example.com"])),
            ),
            EngineResult::new(id("b"), "best crm", CallOutcome::RateLimited),
        ];

        let score = Scorer::default().score_query(&domain, &query, &results, Utc::now());
        let order: Vec<&str> = score.engines.iter().map(|e| e.engine.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        // rank 1, confidence 100 => 100
        assert_eq!(score.overall, Visibility::Scored(100.0));
    }

    #[test]
    fn test_all_failed_is_indeterminate() {
        let domain = TrackedDomain::parse("example.com").unwrap();
        let query = Query::new("best crm").unwrap();
        let results = vec![
            EngineResult::new(id("a"), "best crm", CallOutcome::Timeout),
            EngineResult::new(
                id("b"),
                "best crm",
                CallOutcome::Error {
                    kind: crate::types::engine::ErrorKind::Auth,
                    message: "401".into(),
                },
            ),
        ];
        let score = Scorer::default().score_query(&domain, &query, &results, Utc::now());
        assert!(score.overall.is_indeterminate());
    }

    proptest! {
        #[test]
        fn prop_score_deterministic_and_bounded(
            position in 1u32..40,
            confidence in 0u8..=100,
            floor in 0u8..=100,
            cited in any::<bool>(),
        ) {
            let evidence = if cited {
                CitationEvidence::structured(position, confidence, "https://example.com")
            } else {
                CitationEvidence::not_cited()
            };
            let config = ScoringConfig::new().with_floor("a", floor);
            let first = score_engine(&id("a"), CallStatus::Ok, &evidence, &config);
            let second = score_engine(&id("a"), CallStatus::Ok, &evidence, &config);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.score <= 100);
            prop_assert!(first.score >= floor);
            prop_assert_eq!(first.position.is_some(), cited);
        }
    }
}
