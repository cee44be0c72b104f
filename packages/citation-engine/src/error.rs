//! Typed errors for the citation engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Two families exist and they never mix:
//!
//! - [`EngineError`] describes why a single engine call failed. It lives only
//!   inside adapters and is always folded into a [`CallOutcome`] before it
//!   crosses the adapter boundary.
//! - [`ConfigError`] / [`TrackerError`] are programmer errors (bad setup or a
//!   malformed request) and are the only errors the public API returns.
//!
//! [`CallOutcome`]: crate::types::engine::CallOutcome

use thiserror::Error;

/// Why an individual engine call failed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connection refused, DNS failure, reset, etc.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The engine did not answer before the deadline
    #[error("engine call timed out")]
    Timeout,

    /// Credentials rejected (401/403)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Engine signalled throttling (429)
    #[error("rate limited by engine")]
    RateLimited,

    /// Response arrived but could not be parsed
    #[error("malformed engine response: {0}")]
    Malformed(String),

    /// Any other non-success response
    #[error("engine API error: {0}")]
    Api(String),
}

impl EngineError {
    /// Whether retrying the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::Transport(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(Box::new(e))
        }
    }
}

/// Invalid configuration or request. Fatal at startup / request time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No engines were configured
    #[error("at least one engine must be configured")]
    NoEngines,

    /// No adapter exists for this engine id
    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    /// Two engines share the same id
    #[error("duplicate engine id: {0}")]
    DuplicateEngine(String),

    /// A concurrency or worker bound of zero
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },

    /// Per-call timeout must be strictly shorter than the batch deadline
    #[error("per-call timeout for {engine} must be shorter than the batch deadline")]
    TimeoutExceedsDeadline { engine: String },

    /// Domain string could not be normalized to a host
    #[error("invalid domain: {input}")]
    InvalidDomain { input: String },

    /// Query text is empty
    #[error("query text must not be empty")]
    EmptyQuery,

    /// A tracking request carried no queries
    #[error("at least one query is required")]
    NoQueries,
}

/// Errors returned by the tracker entry points.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Configuration or request validation failed
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Trend store operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type alias used inside engine adapters.
pub type EngineCallResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration validation.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
