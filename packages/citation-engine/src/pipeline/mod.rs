//! The visibility pipeline.
//!
//! Data flows one way:
//! - Dispatch (fan each query out to every engine, bounded and retried)
//! - Extract (citation evidence per engine answer)
//! - Score (per engine, per query, per run)
//! - Trend (fold runs into bucketed series)
//! - Compare (rank against competitors on the same answers)
//! - Recommend (rules over scores and trend history)
//!
//! [`tracker::VisibilityTracker`] runs the whole flow for one request.

pub mod compare;
pub mod dispatch;
pub mod extract;
pub mod recommend;
pub mod score;
pub mod tracker;
pub mod trend;

pub use compare::{compare, is_comparable};
pub use dispatch::Dispatcher;
pub use extract::CitationExtractor;
pub use recommend::{recommend, recommend_for_run, RecommendationContext};
pub use score::{position_score, score_engine, Scorer};
pub use tracker::{BatchSummary, TrackReport, TrackRequest, VisibilityTracker};
pub use trend::{streak, weekly_growth, RunningTotals, TrendReport, TrendSeries};
