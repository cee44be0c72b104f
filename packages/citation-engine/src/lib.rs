//! Cross-Engine Citation Visibility Scoring
//!
//! Asks a bounded set of AI answer engines a bounded set of questions and
//! measures whether, and how prominently, each engine cites a tracked domain.
//!
//! # Design Philosophy
//!
//! - Never throw for expected failures: every engine call resolves to a status
//! - "No data" is not "zero visibility": indeterminate runs stay distinct
//! - Scores are pure functions of stored answers, so runs can be rescored
//! - Library handles mechanics, the host application handles presentation
//!
//! # Usage
//!
//! ```rust,ignore
//! use citation_engine::{Dispatcher, DispatchConfig, MemoryTrendStore, Query, TrackRequest,
//!     TrackedDomain, VisibilityTracker};
//! use citation_engine::testing::{MockEngine, MockReply};
//! use std::sync::Arc;
//!
//! let engine = MockEngine::new("perplexity")
//!     .with_reply("best crm", MockReply::cites("...", &["https://example.com/crm"]));
//! let dispatcher = Dispatcher::new(vec![Arc::new(engine)], DispatchConfig::default())?;
//! let tracker = VisibilityTracker::new(dispatcher, MemoryTrendStore::new());
//!
//! let request = TrackRequest::new(TrackedDomain::parse("example.com")?)
//!     .with_query(Query::new("best crm")?)
//!     .with_competitor(TrackedDomain::parse("rival.io")?);
//! let report = tracker.track(request).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (AnswerEngine, TrendStore)
//! - [`types`] - Domain, engine, score, trend and report types
//! - [`pipeline`] - Dispatch, extraction, scoring, trends, comparison, recommendations
//! - [`engines`] - Engine adapters (OpenAI, Perplexity, Tavily) and rate limiting
//! - [`stores`] - Storage implementations (MemoryTrendStore)
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod engines;
pub mod error;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{ConfigError, EngineError, TrackerError};
pub use pipeline::{
    BatchSummary, CitationExtractor, Dispatcher, RecommendationContext, Scorer, TrackReport,
    TrackRequest, TrendReport, TrendSeries, VisibilityTracker,
};
pub use security::SecretString;
pub use stores::MemoryTrendStore;
pub use traits::{engine::AnswerEngine, store::TrendStore};
pub use types::{
    batch::{Batch, BatchState, Interruption},
    citation::{CitationEvidence, EvidenceBasis},
    compare::{CompetitiveReport, CompetitorSnapshot},
    config::{DispatchConfig, ExtractorConfig, ScoringConfig, TrendConfig},
    domain::{Query, TrackedDomain},
    engine::{CallOutcome, CallStatus, EngineConfig, EngineId, EngineResult, RawAnswer, SourceRef},
    recommendation::{Priority, Recommendation, RecommendationKind},
    score::{DomainRun, EngineScore, Visibility, VisibilityScore},
    trend::{BucketWindow, Growth, PeriodData, PeriodSummary, TrendPoint},
};
