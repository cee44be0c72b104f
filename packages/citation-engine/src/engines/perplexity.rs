//! Perplexity engine.
//!
//! Perplexity's chat API returns the sources it used alongside the answer,
//! either as `search_results` (with titles) or as a bare `citations` URL
//! list. Both keep the engine's own ranking.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{api_key, endpoint, error_for_status, ANSWER_INSTRUCTION};
use crate::error::{EngineCallResult, EngineError};
use crate::traits::engine::AnswerEngine;
use crate::types::engine::{EngineConfig, RawAnswer, SourceRef};

const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_MODEL: &str = "sonar";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct PerplexityResponse {
    choices: Vec<Choice>,
    citations: Option<Vec<String>>,
    search_results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    url: String,
    title: Option<String>,
}

/// Perplexity chat-completions adapter.
pub struct PerplexityEngine {
    config: EngineConfig,
    client: reqwest::Client,
}

impl PerplexityEngine {
    /// Create an adapter from its engine config.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AnswerEngine for PerplexityEngine {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn ask(&self, query: &str) -> EngineCallResult<RawAnswer> {
        let key = api_key(&self.config)?;
        let request = ChatRequest {
            model: self.config.model.as_deref().unwrap_or(DEFAULT_MODEL),
            messages: vec![
                Message {
                    role: "system",
                    content: ANSWER_INSTRUCTION,
                },
                Message {
                    role: "user",
                    content: query,
                },
            ],
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                endpoint(&self.config, DEFAULT_BASE_URL)
            ))
            .header("Authorization", key.bearer())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: PerplexityResponse = response.json().await?;
        parse_response(body)
    }
}

fn parse_response(body: PerplexityResponse) -> EngineCallResult<RawAnswer> {
    let text = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| EngineError::Malformed("no answer content in response".into()))?;

    let sources = match (body.search_results, body.citations) {
        (Some(results), _) => Some(
            results
                .into_iter()
                .map(|r| SourceRef {
                    url: r.url,
                    title: r.title,
                })
                .collect(),
        ),
        (None, Some(urls)) => Some(urls.into_iter().map(SourceRef::new).collect()),
        (None, None) => None,
    };

    Ok(RawAnswer { text, sources })
}
