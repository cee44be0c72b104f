//! Engine identity, configuration and raw call results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::EngineError;
use crate::security::SecretString;

/// Stable identifier of an answer engine (`openai`, `perplexity`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Per-engine configuration supplied by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub id: EngineId,

    /// API base URL override. Adapters fall back to their public endpoint.
    pub endpoint: Option<String>,

    /// Model name, for engines that take one
    pub model: Option<String>,

    /// API credentials. Never serialized.
    #[serde(skip)]
    pub api_key: Option<SecretString>,

    /// Deadline for a single call attempt.
    ///
    /// Default: 30s.
    pub per_call_timeout: Duration,

    /// Retries for timeout / rate-limit / transport failures.
    ///
    /// Default: 1.
    pub max_retries: u32,

    /// Concurrent in-flight calls to this engine.
    ///
    /// Default: 4.
    pub max_concurrency: usize,

    /// Optional sustained request rate enforced before each call.
    pub requests_per_second: Option<u32>,

    /// Score assigned when the engine answers without citing the domain.
    ///
    /// Raise this for engines known to under-report sources. Default: 0.
    pub floor_score: u8,
}

impl EngineConfig {
    /// Create a config with defaults for the given engine id.
    pub fn new(id: impl Into<EngineId>) -> Self {
        Self {
            id: id.into(),
            endpoint: None,
            model: None,
            api_key: None,
            per_call_timeout: Duration::from_secs(30),
            max_retries: 1,
            max_concurrency: 4,
            requests_per_second: None,
            floor_score: 0,
        }
    }

    /// Set the API base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(key));
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the concurrency bound.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Set a requests-per-second quota.
    pub fn with_rate_limit(mut self, rps: u32) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    /// Set the floor score (clamped to 100).
    pub fn with_floor(mut self, floor: u8) -> Self {
        self.floor_score = floor.min(100);
        self
    }
}

impl From<&str> for EngineConfig {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One entry of an engine-native source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    pub title: Option<String>,
}

impl SourceRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// What an adapter got back from the engine on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnswer {
    pub text: String,

    /// `None` when the engine has no notion of sources; `Some(vec![])` when
    /// it explicitly reported none.
    pub sources: Option<Vec<SourceRef>>,
}

impl RawAnswer {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: None,
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceRef>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_source_urls(self, urls: &[&str]) -> Self {
        self.with_sources(urls.iter().map(|u| SourceRef::new(*u)).collect())
    }
}

/// Coarse call status, as reported on dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ok,
    Timeout,
    Error,
    RateLimited,
}

/// Sub-classification of [`CallStatus::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection-level failure; worth one retry
    Transport,
    /// Credentials rejected; never retried
    Auth,
    /// Response could not be parsed
    Malformed,
    /// Any other non-success response
    Api,
}

/// Outcome of one engine call, tagged by status.
///
/// Only the `Ok` variant carries an answer, so consumers cannot read answer
/// text without first handling the failure cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    Ok(RawAnswer),
    Timeout,
    RateLimited,
    Error { kind: ErrorKind, message: String },
}

impl CallOutcome {
    pub fn status(&self) -> CallStatus {
        match self {
            Self::Ok(_) => CallStatus::Ok,
            Self::Timeout => CallStatus::Timeout,
            Self::RateLimited => CallStatus::RateLimited,
            Self::Error { .. } => CallStatus::Error,
        }
    }

    /// Whether the dispatcher should spend a retry on this outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::RateLimited
                | Self::Error {
                    kind: ErrorKind::Transport,
                    ..
                }
        )
    }

    pub fn answer(&self) -> Option<&RawAnswer> {
        match self {
            Self::Ok(answer) => Some(answer),
            _ => None,
        }
    }
}

impl From<EngineError> for CallOutcome {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::Timeout => Self::Timeout,
            EngineError::RateLimited => Self::RateLimited,
            EngineError::Transport(_) => Self::Error {
                kind: ErrorKind::Transport,
                message,
            },
            EngineError::Auth(_) => Self::Error {
                kind: ErrorKind::Auth,
                message,
            },
            EngineError::Malformed(_) => Self::Error {
                kind: ErrorKind::Malformed,
                message,
            },
            EngineError::Api(_) => Self::Error {
                kind: ErrorKind::Api,
                message,
            },
        }
    }
}

/// One engine's answer to one query. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineResult {
    pub engine: EngineId,
    pub query: String,
    pub outcome: CallOutcome,

    /// Wall time of the final attempt
    pub latency_ms: u64,

    /// Attempts made, including retries
    pub attempts: u32,

    pub captured_at: DateTime<Utc>,
}

impl EngineResult {
    pub fn new(engine: EngineId, query: impl Into<String>, outcome: CallOutcome) -> Self {
        Self {
            engine,
            query: query.into(),
            outcome,
            latency_ms: 0,
            attempts: 1,
            captured_at: Utc::now(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = latency.as_millis() as u64;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }

    pub fn status(&self) -> CallStatus {
        self.outcome.status()
    }

    pub fn is_ok(&self) -> bool {
        self.status() == CallStatus::Ok
    }
}
