//! Testing utilities including a scripted mock engine.
//!
//! Useful for testing applications that embed the engine without making real
//! network calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{EngineCallResult, EngineError};
use crate::traits::engine::AnswerEngine;
use crate::types::engine::{EngineConfig, EngineId, RawAnswer};

/// A scripted reply from [`MockEngine`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Answer(RawAnswer),
    Timeout,
    RateLimited,
    Auth,
    Transport,
    Malformed,

    /// Sleep this long, then answer. Use to trip per-call timeouts.
    Slow(Duration, RawAnswer),
}

impl MockReply {
    /// Answer citing the given URLs in order.
    pub fn cites(text: impl Into<String>, urls: &[&str]) -> Self {
        Self::Answer(RawAnswer::text(text).with_source_urls(urls))
    }

    /// Answer without a source list.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Answer(RawAnswer::text(text))
    }

    /// Never answers within any reasonable test deadline.
    pub fn hang() -> Self {
        Self::Slow(Duration::from_secs(3600), RawAnswer::default())
    }
}

/// A mock answer engine for testing.
///
/// Replies are scripted per query text. Each call pops the next scripted
/// reply; the last one repeats. Queries without a script get the default
/// reply.
pub struct MockEngine {
    config: EngineConfig,

    /// Scripted replies by query text
    scripts: Arc<RwLock<HashMap<String, VecDeque<MockReply>>>>,

    /// Reply for unscripted queries
    default_reply: MockReply,

    /// Added before every reply
    latency: Option<Duration>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockEngine {
    /// Create a mock engine with default behavior.
    pub fn new(id: &str) -> Self {
        Self::with_config(EngineConfig::new(id))
    }

    /// Create a mock engine with a specific config.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            scripts: Arc::new(RwLock::new(HashMap::new())),
            default_reply: MockReply::text("I could not find a definitive source for that."),
            latency: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Script the reply sequence for a query.
    pub fn with_replies(self, query: impl Into<String>, replies: Vec<MockReply>) -> Self {
        self.scripts
            .write()
            .unwrap()
            .insert(query.into(), replies.into());
        self
    }

    /// Script a single repeating reply for a query.
    pub fn with_reply(self, query: impl Into<String>, reply: MockReply) -> Self {
        self.with_replies(query, vec![reply])
    }

    /// Set the reply for unscripted queries.
    pub fn with_default_reply(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Add artificial latency to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.per_call_timeout = timeout;
        self
    }

    /// Set the floor score.
    pub fn with_floor(mut self, floor: u8) -> Self {
        self.config.floor_score = floor;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn id(&self) -> &EngineId {
        &self.config.id
    }

    /// Queries received, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls for one query.
    pub fn call_count(&self, query: &str) -> usize {
        self.calls.read().unwrap().iter().filter(|q| *q == query).count()
    }

    fn next_reply(&self, query: &str) -> MockReply {
        let mut scripts = self.scripts.write().unwrap();
        match scripts.get_mut(query) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| self.default_reply.clone()),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.default_reply.clone()),
            None => self.default_reply.clone(),
        }
    }
}

#[async_trait]
impl AnswerEngine for MockEngine {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn ask(&self, query: &str) -> EngineCallResult<RawAnswer> {
        self.calls.write().unwrap().push(query.to_string());
        let reply = self.next_reply(query);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match reply {
            MockReply::Answer(answer) => Ok(answer),
            MockReply::Timeout => Err(EngineError::Timeout),
            MockReply::RateLimited => Err(EngineError::RateLimited),
            MockReply::Auth => Err(EngineError::Auth("invalid api key".into())),
            MockReply::Transport => Err(EngineError::Transport(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )))),
            MockReply::Malformed => Err(EngineError::Malformed("unexpected end of JSON".into())),
            MockReply::Slow(delay, answer) => {
                tokio::time::sleep(delay).await;
                Ok(answer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_sequence_repeats_last() {
        let engine = MockEngine::new("openai").with_replies(
            "q",
            vec![MockReply::Timeout, MockReply::text("answer")],
        );

        assert!(matches!(engine.ask("q").await, Err(EngineError::Timeout)));
        assert_eq!(engine.ask("q").await.unwrap().text, "answer");
        assert_eq!(engine.ask("q").await.unwrap().text, "answer");
        assert_eq!(engine.call_count("q"), 3);
    }

    #[tokio::test]
    async fn test_default_reply() {
        let engine = MockEngine::new("openai");
        let answer = engine.ask("anything").await.unwrap();
        assert!(answer.sources.is_none());
        assert_eq!(engine.calls(), vec!["anything".to_string()]);
    }
}
