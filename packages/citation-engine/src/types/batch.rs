//! Dispatch batch state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::engine::{CallStatus, EngineId, EngineResult};

/// Lifecycle of a dispatch batch.
///
/// `Pending -> Dispatched -> {Completed, PartiallyCompleted, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Pending,
    Dispatched,

    /// Every call reached `ok`
    Completed,

    /// At least one call reached `ok`
    PartiallyCompleted,

    /// No call reached `ok`
    Failed,
}

impl BatchState {
    /// Terminal state for a set of final call statuses.
    pub fn from_statuses<I: IntoIterator<Item = CallStatus>>(statuses: I) -> Self {
        let (ok, total) = statuses.into_iter().fold((0usize, 0usize), |(ok, total), s| {
            (ok + usize::from(s == CallStatus::Ok), total + 1)
        });

        if total > 0 && ok == total {
            Self::Completed
        } else if ok > 0 {
            Self::PartiallyCompleted
        } else {
            Self::Failed
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PartiallyCompleted | Self::Failed
        )
    }
}

/// Why a batch stopped before every call finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interruption {
    DeadlineExceeded,
    Cancelled,
}

/// Results of fanning a query set out to every configured engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub state: BatchState,

    /// Exactly one final result per (query, engine) pair, in query-major
    /// then engine order.
    pub results: Vec<EngineResult>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Set when pending calls were abandoned
    pub interrupted: Option<Interruption>,
}

impl Batch {
    /// Results for one query, in engine order.
    pub fn results_for<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a EngineResult> {
        self.results.iter().filter(move |r| r.query == query)
    }

    /// Count of final results per status.
    pub fn status_count(&self, status: CallStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }

    /// Engines that produced no `ok` result in the whole batch.
    pub fn unreachable_engines(&self) -> Vec<EngineId> {
        let mut engines: Vec<EngineId> = self.results.iter().map(|r| r.engine.clone()).collect();
        engines.sort();
        engines.dedup();
        engines
            .into_iter()
            .filter(|id| !self.results.iter().any(|r| &r.engine == id && r.is_ok()))
            .collect()
    }
}
