//! Rate-limited engine wrapper.
//!
//! Wraps any AnswerEngine with a request quota using the governor crate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::EngineCallResult;
use crate::traits::engine::AnswerEngine;
use crate::types::engine::{EngineConfig, RawAnswer};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// An engine wrapper that waits for a quota permit before every call.
pub struct RateLimitedEngine<E: AnswerEngine> {
    inner: E,
    limiter: Arc<DefaultRateLimiter>,
}

impl<E: AnswerEngine> RateLimitedEngine<E> {
    /// Limit to `requests_per_second` sustained calls (minimum 1).
    pub fn new(engine: E, requests_per_second: u32) -> Self {
        Self::with_quota(engine, Quota::per_second(non_zero(requests_per_second)))
    }

    /// Limit with a custom quota.
    pub fn with_quota(engine: E, quota: Quota) -> Self {
        Self {
            inner: engine,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Sustained rate with a burst allowance.
    pub fn with_burst(engine: E, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(non_zero(requests_per_second)).allow_burst(non_zero(burst));
        Self::with_quota(engine, quota)
    }

    /// The wrapped engine.
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

#[async_trait]
impl<E: AnswerEngine> AnswerEngine for RateLimitedEngine<E> {
    fn config(&self) -> &EngineConfig {
        self.inner.config()
    }

    async fn ask(&self, query: &str) -> EngineCallResult<RawAnswer> {
        self.limiter.until_ready().await;
        self.inner.ask(query).await
    }
}

/// Extension trait for easy rate limiting.
pub trait AnswerEngineExt: AnswerEngine + Sized {
    /// Wrap this engine with rate limiting.
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedEngine<Self> {
        RateLimitedEngine::new(self, requests_per_second)
    }

    /// Wrap with rate limiting and burst support.
    fn rate_limited_with_burst(self, requests_per_second: u32, burst: u32) -> RateLimitedEngine<Self> {
        RateLimitedEngine::with_burst(self, requests_per_second, burst)
    }
}

impl<E: AnswerEngine + Sized> AnswerEngineExt for E {}
