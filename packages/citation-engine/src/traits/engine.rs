//! Answer engine trait.
//!
//! An answer engine is any external service that takes a natural-language
//! question and returns an answer, optionally with the sources it used
//! (conversational search assistants, LLM chat APIs, search APIs with an
//! answer mode).
//!
//! Implementations report failures as typed [`EngineError`]s from
//! [`AnswerEngine::ask`]. The library never lets those escape: [`query`]
//! folds every outcome into an [`EngineResult`] so the dispatcher can treat
//! partial failure uniformly.

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{EngineCallResult, EngineError};
use crate::types::engine::{CallOutcome, EngineConfig, EngineResult, RawAnswer};

/// A single external answer engine.
///
/// # Implementations
///
/// - `OpenAiEngine` - chat completions, URL annotations when available
/// - `PerplexityEngine` - chat completions with a native citation list
/// - `TavilyEngine` - search API with answer mode
/// - `MockEngine` - scripted responses for testing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerEngine: Send + Sync {
    /// Engine identity, limits and floor score.
    fn config(&self) -> &EngineConfig;

    /// Ask one question.
    ///
    /// Implementations should not retry or apply timeouts themselves; the
    /// dispatcher owns both.
    async fn ask(&self, query: &str) -> EngineCallResult<RawAnswer>;
}

/// Query an engine, capturing any failure as a call status.
///
/// Never fails: transport, auth, throttling and parse errors all come back
/// as an [`EngineResult`] with a non-`ok` outcome and no answer text.
pub async fn query(engine: &dyn AnswerEngine, text: &str) -> EngineResult {
    let config = engine.config();
    let start = Instant::now();

    let outcome = match engine.ask(text).await {
        Ok(answer) => {
            debug!(
                engine = %config.id,
                query = %text,
                sources = answer.sources.as_ref().map(|s| s.len()),
                "Engine answered"
            );
            CallOutcome::Ok(answer)
        }
        Err(e) => {
            log_failure(config, text, &e);
            CallOutcome::from(e)
        }
    };

    EngineResult::new(config.id.clone(), text, outcome).with_latency(start.elapsed())
}

fn log_failure(config: &EngineConfig, text: &str, error: &EngineError) {
    match error {
        EngineError::Malformed(_) => {
            warn!(engine = %config.id, query = %text, error = %error, "Malformed engine response")
        }
        _ => warn!(engine = %config.id, query = %text, error = %error, "Engine call failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::engine::{CallStatus, ErrorKind};

    #[tokio::test]
    async fn test_query_wraps_success() {
        let mut engine = MockAnswerEngine::new();
        engine.expect_config().return_const(EngineConfig::new("perplexity"));
        engine.expect_ask().returning(|_| {
            Ok(RawAnswer::text("See example.com").with_source_urls(&["https://example.com"]))
        });

        let result = query(&engine, "best widgets").await;
        assert_eq!(result.status(), CallStatus::Ok);
        assert_eq!(result.engine.as_str(), "perplexity");
        assert_eq!(result.query, "best widgets");
    }

    #[tokio::test]
    async fn test_query_never_raises() {
        let mut engine = MockAnswerEngine::new();
        engine.expect_config().return_const(EngineConfig::new("openai"));
        engine
            .expect_ask()
            .returning(|_| Err(EngineError::Auth("invalid api key".into())));

        let result = query(&engine, "best widgets").await;
        assert_eq!(result.status(), CallStatus::Error);
        assert!(result.outcome.answer().is_none());
        assert!(matches!(
            result.outcome,
            CallOutcome::Error {
                kind: ErrorKind::Auth,
                ..
            }
        ));
    }
}
