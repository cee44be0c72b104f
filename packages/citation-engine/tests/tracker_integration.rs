//! Integration tests for the tracking flow.
//!
//! These tests drive the public API end to end:
//! 1. Dispatch queries to scripted engines
//! 2. Extract and score citations
//! 3. Record runs and read trends
//! 4. Compare competitors and generate recommendations

use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use citation_engine::{
    pipeline::{score_engine, streak, weekly_growth},
    testing::{MockEngine, MockReply},
    AnswerEngine, BatchState, CallStatus, CitationEvidence, DispatchConfig, Dispatcher, DomainRun,
    EngineId, Growth, Interruption, MemoryTrendStore, Priority, Query, RecommendationKind,
    ScoringConfig, TrackRequest, TrackedDomain, TrendStore, Visibility, VisibilityTracker,
};

const ANSWER: &str = "Most reviewers agree that the right choice depends on team size, budget \
    and the integrations you already rely on. The options below are consistently rated well \
    for onboarding, reporting and support, and each offers a free trial so you can compare \
    them on your own data before committing to a paid plan.";

fn tracker(engines: Vec<Arc<dyn AnswerEngine>>) -> VisibilityTracker<MemoryTrendStore> {
    let config = DispatchConfig::new().with_retry_base_delay(Duration::from_millis(1));
    let dispatcher = Dispatcher::new(engines, config).unwrap();
    VisibilityTracker::new(dispatcher, MemoryTrendStore::new())
}

fn request(queries: &[&str]) -> TrackRequest {
    TrackRequest::new(TrackedDomain::parse("example.com").unwrap())
        .with_queries(queries.iter().map(|q| Query::new(*q).unwrap()))
}

/// Hand-built run with a given overall score.
fn scored_run(domain: &str, score: f64, days_ago: i64) -> DomainRun {
    let at = Utc::now() - TimeDelta::days(days_ago);
    DomainRun {
        run_id: Uuid::now_v7(),
        domain: domain.into(),
        queries: vec![],
        overall: Visibility::Scored(score),
        batch: BatchState::Completed,
        run_at: at,
        window_start: at,
        window_end: at,
    }
}

#[test]
fn test_rank_two_and_uncited_engine_average_to_43() {
    let scoring = ScoringConfig::new();
    let a = score_engine(
        &EngineId::new("a"),
        CallStatus::Ok,
        &CitationEvidence::structured(2, 80, "https://example.com/guide"),
        &scoring,
    );
    let b = score_engine(
        &EngineId::new("b"),
        CallStatus::Ok,
        &CitationEvidence::not_cited(),
        &scoring,
    );

    assert_eq!(a.score, 86);
    assert_eq!(b.score, 0);
    assert_eq!(
        Visibility::mean([a.score as f64, b.score as f64]),
        Visibility::Scored(43.0)
    );
}

#[test]
fn test_weekly_growth_and_streak_edge_cases() {
    assert_eq!(weekly_growth(0, 0), Growth::Percent(0.0));
    assert_eq!(weekly_growth(5, 0), Growth::NewActivity);
    assert_eq!(streak([true, true, false, true]), 2);
}

#[tokio::test]
async fn test_one_ok_two_timeouts_is_partially_completed() {
    let t = tracker(vec![
        Arc::new(MockEngine::new("openai").with_reply(
            "best crm",
            MockReply::cites(ANSWER, &["https://example.com/crm"]),
        )),
        Arc::new(MockEngine::new("perplexity").with_default_reply(MockReply::Timeout)),
        Arc::new(MockEngine::new("tavily").with_default_reply(MockReply::Timeout)),
    ]);

    let report = t.track(request(&["best crm"])).await.unwrap();

    assert_eq!(report.batch.state, BatchState::PartiallyCompleted);
    assert_eq!(report.run.batch, BatchState::PartiallyCompleted);
    assert_eq!(report.batch.ok, 1);
    assert_eq!(report.batch.timeout, 2);

    // rank 1, full confidence; the timeouts are excluded, not zeroed
    assert_eq!(report.run.overall, Visibility::Scored(100.0));
    let query = &report.run.queries[0];
    assert_eq!(query.engines.len(), 3);
    assert!(!query.engine(&EngineId::new("perplexity")).unwrap().is_counted());
}

#[tokio::test]
async fn test_rescoring_a_batch_is_idempotent() {
    let t = tracker(vec![
        Arc::new(MockEngine::new("openai").with_default_reply(MockReply::cites(
            ANSWER,
            &["https://rival.io", "https://www.example.com/pricing"],
        ))),
        Arc::new(MockEngine::new("perplexity").with_default_reply(MockReply::text(format!(
            "{} Many teams start with example.com.",
            ANSWER
        )))),
    ]);
    let domain = TrackedDomain::parse("example.com").unwrap();
    let queries = vec![Query::new("best crm").unwrap(), Query::new("crm pricing").unwrap()];

    let batch = t.dispatcher().dispatch(&queries).await;
    let first = t.rescore(&domain, &queries, &batch);
    let second = t.rescore(&domain, &queries, &batch);

    assert_eq!(first, second);
    let openai = first.queries[0].engine(&EngineId::new("openai")).unwrap();
    assert_eq!(openai.position, Some(2));
    let perplexity = first.queries[0].engine(&EngineId::new("perplexity")).unwrap();
    assert!(perplexity.cited);
    assert!(perplexity.position.is_none());
}

#[tokio::test]
async fn test_rank_five_recommends_improving_rank() {
    let t = tracker(vec![Arc::new(MockEngine::new("a").with_default_reply(
        MockReply::cites(
            ANSWER,
            &[
                "https://one.org",
                "https://two.org",
                "https://three.org",
                "https://four.org",
                "https://example.com/guide",
            ],
        ),
    ))]);

    let report = t.track(request(&["best crm"])).await.unwrap();
    let for_a: Vec<_> = report
        .recommendations
        .iter()
        .filter(|r| r.engine == Some(EngineId::new("a")))
        .collect();

    assert_eq!(for_a.len(), 1);
    assert_eq!(for_a[0].kind, RecommendationKind::ImproveRanking);
    assert_eq!(for_a[0].priority, Priority::Medium);
    assert!(for_a[0].expected_impact > 0.0);
    assert!(!report
        .recommendations
        .iter()
        .any(|r| r.kind == RecommendationKind::NotCited));
}

#[tokio::test]
async fn test_competitors_scored_on_same_answers() {
    let t = tracker(vec![
        Arc::new(MockEngine::new("openai").with_default_reply(MockReply::cites(
            ANSWER,
            &["https://rival.io/a", "https://example.com/b"],
        ))),
        Arc::new(MockEngine::new("perplexity").with_default_reply(MockReply::cites(
            ANSWER,
            &["https://rival.io/c"],
        ))),
    ]);

    let report = t
        .track(
            request(&["best crm", "crm for startups"])
                .with_competitor(TrackedDomain::parse("https://www.rival.io/").unwrap()),
        )
        .await
        .unwrap();

    let competition = report.competition.unwrap();
    let rival = &competition.competitors[0];
    assert_eq!(rival.domain, "rival.io");
    assert_eq!(rival.rank, 1);
    assert_eq!(competition.tracked_rank, 2);
    assert!(rival.difference.unwrap() > 0.0);
    // 2 tracked citations out of 6
    let share = competition.share_of_voice.unwrap();
    assert!((share - 100.0 / 3.0).abs() < 1e-9);

    let rival_runs = t.store().runs("rival.io").await.unwrap();
    assert_eq!(rival_runs.len(), 1);
    assert_eq!(rival_runs[0].window_start, report.run.window_start);
}

#[tokio::test]
async fn test_deadline_keeps_completed_answers() {
    let t = tracker(vec![
        Arc::new(
            MockEngine::new("fast")
                .with_timeout(Duration::from_millis(100))
                .with_default_reply(MockReply::cites(ANSWER, &["https://example.com"])),
        ),
        Arc::new(
            MockEngine::new("slow")
                .with_timeout(Duration::from_millis(200))
                .with_default_reply(MockReply::hang()),
        ),
    ]);

    let report = t
        .track(request(&["best crm"]).with_deadline(Duration::from_millis(300)))
        .await
        .unwrap();

    assert_eq!(report.batch.interrupted, Some(Interruption::DeadlineExceeded));
    assert_eq!(report.batch.state, BatchState::PartiallyCompleted);
    assert_eq!(report.run.overall, Visibility::Scored(100.0));
}

#[tokio::test]
async fn test_no_data_is_not_zero_in_trends() {
    let t = tracker(vec![Arc::new(
        MockEngine::new("a").with_default_reply(MockReply::Auth),
    )]);

    let report = t.track(request(&["best crm"])).await.unwrap();

    assert!(report.is_no_data());
    let today = report.trend.points.last().unwrap();
    let summary = today.summary().unwrap();
    assert_eq!(summary.runs, 1);
    assert_eq!(summary.indeterminate_runs, 1);
    assert_eq!(summary.mean_score, None);
}

#[tokio::test]
async fn test_erosion_flagged_from_history() {
    let t = tracker(vec![Arc::new(MockEngine::new("a"))]);
    for run in [
        scored_run("example.com", 80.0, 1),
        scored_run("example.com", 40.0, 0),
        scored_run("rival.io", 20.0, 1),
        scored_run("rival.io", 60.0, 0),
    ] {
        t.store().record_run(&run).await.unwrap();
    }

    let recs = t
        .recommendations("example.com", &["rival.io"], Utc::now())
        .await
        .unwrap();

    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].kind, RecommendationKind::CompetitiveErosion);
    assert_eq!(recs[0].priority, Priority::High);
    assert_eq!(recs[0].expected_impact, 80.0);

    let trend = t.trend("example.com", Utc::now()).await.unwrap();
    assert_eq!(trend.lifetime_runs, 2);
    assert_eq!(trend.lifetime_mean, Some(60.0));
}
