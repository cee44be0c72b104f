//! Tavily search engine in answer mode.
//!
//! Tavily returns a generated answer plus the ranked result list it was
//! built from; the result order is used as citation rank.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{api_key, endpoint, error_for_status};
use crate::error::EngineCallResult;
use crate::traits::engine::AnswerEngine;
use crate::types::engine::{EngineConfig, RawAnswer, SourceRef};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Tavily search request.
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: usize,
}

/// Tavily search response.
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// A single Tavily search result.
#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
}

/// Tavily adapter.
pub struct TavilyEngine {
    config: EngineConfig,
    client: reqwest::Client,
    search_depth: String,
    max_results: usize,
}

impl TavilyEngine {
    /// Create an adapter from its engine config.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            search_depth: "basic".to_string(),
            max_results: 10,
        }
    }

    /// Set search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    /// Set the number of ranked results requested.
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max.max(1);
        self
    }
}

#[async_trait]
impl AnswerEngine for TavilyEngine {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn ask(&self, query: &str) -> EngineCallResult<RawAnswer> {
        let key = api_key(&self.config)?;
        let request = TavilyRequest {
            query,
            search_depth: &self.search_depth,
            include_answer: true,
            max_results: self.max_results,
        };

        let response = self
            .client
            .post(format!("{}/search", endpoint(&self.config, DEFAULT_BASE_URL)))
            .header("Content-Type", "application/json")
            .header("Authorization", key.bearer())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: TavilyResponse = response.json().await?;
        Ok(into_answer(body))
    }
}

fn into_answer(body: TavilyResponse) -> RawAnswer {
    let sources = body
        .results
        .into_iter()
        .map(|r| SourceRef {
            url: r.url,
            title: r.title,
        })
        .collect();

    RawAnswer {
        text: body.answer.unwrap_or_default(),
        sources: Some(sources),
    }
}
