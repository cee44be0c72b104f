//! Configuration for dispatch, extraction, scoring and trend aggregation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::engine::{EngineConfig, EngineId};
use super::trend::BucketWindow;

/// Configuration for the query dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Total in-flight engine calls across all engines.
    ///
    /// Per-engine limits from [`EngineConfig::max_concurrency`] apply on top.
    /// Default: 8.
    pub worker_limit: usize,

    /// First retry delay; doubles per attempt and is jittered.
    ///
    /// Default: 500ms.
    pub retry_base_delay: Duration,

    /// Deadline for the whole batch. Pending calls are abandoned at expiry.
    ///
    /// Default: none.
    pub batch_deadline: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_limit: 8,
            retry_base_delay: Duration::from_millis(500),
            batch_deadline: None,
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global worker bound.
    pub fn with_worker_limit(mut self, limit: usize) -> Self {
        self.worker_limit = limit;
        self
    }

    /// Set the retry base delay.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the batch deadline.
    pub fn with_batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = Some(deadline);
        self
    }
}

/// Tuning for the citation extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Answers with fewer words that mention the domain are treated as
    /// echoes of the question and down-weighted. Default: 8.
    pub short_answer_words: usize,

    /// Answers with at least this many words earn the length bonus.
    /// Default: 40.
    pub substantive_answer_words: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            short_answer_words: 8,
            substantive_answer_words: 40,
        }
    }
}

/// Per-engine floor scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Floor for engines without an explicit entry. Default: 0.
    pub default_floor: u8,

    #[serde(default)]
    pub floors: BTreeMap<EngineId, u8>,
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the floors declared on each engine config.
    pub fn from_engines<'a>(engines: impl IntoIterator<Item = &'a EngineConfig>) -> Self {
        Self {
            default_floor: 0,
            floors: engines
                .into_iter()
                .map(|e| (e.id.clone(), e.floor_score.min(100)))
                .collect(),
        }
    }

    /// Set the floor for one engine.
    pub fn with_floor(mut self, engine: impl Into<EngineId>, floor: u8) -> Self {
        self.floors.insert(engine.into(), floor.min(100));
        self
    }

    pub fn floor_for(&self, engine: &EngineId) -> u8 {
        self.floors
            .get(engine)
            .copied()
            .unwrap_or(self.default_floor)
            .min(100)
    }
}

/// Configuration for trend aggregation and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Bucket width. Default: one UTC day.
    pub window: BucketWindow,

    /// Number of periods returned in a tracking report. Default: 30.
    pub report_periods: usize,

    /// Periods averaged by the moving average. Default: 7.
    pub moving_average_periods: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: BucketWindow::DAY,
            report_periods: 30,
            moving_average_periods: 7,
        }
    }
}

impl TrendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: BucketWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_report_periods(mut self, periods: usize) -> Self {
        self.report_periods = periods.max(1);
        self
    }
}
