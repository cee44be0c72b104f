//! OpenAI chat-completions engine.
//!
//! Plain chat models return no source list, so citations are detected from
//! the answer text. Search-enabled models attach `url_citation` annotations,
//! which are surfaced as the structured source list in annotation order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{api_key, endpoint, error_for_status, ANSWER_INSTRUCTION};
use crate::error::{EngineCallResult, EngineError};
use crate::traits::engine::AnswerEngine;
use crate::types::engine::{EngineConfig, RawAnswer, SourceRef};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

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
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    annotations: Option<Vec<Annotation>>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(rename = "type")]
    kind: String,
    url_citation: Option<UrlCitation>,
}

#[derive(Debug, Deserialize)]
struct UrlCitation {
    url: String,
    title: Option<String>,
}

/// OpenAI chat-completions adapter.
pub struct OpenAiEngine {
    config: EngineConfig,
    client: reqwest::Client,
}

impl OpenAiEngine {
    /// Create an adapter from its engine config.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AnswerEngine for OpenAiEngine {
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

        let body: ChatResponse = response.json().await?;
        parse_response(body)
    }
}

fn parse_response(body: ChatResponse) -> EngineCallResult<RawAnswer> {
    let message = body
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| EngineError::Malformed("no choices in response".into()))?;

    let text = message.content.unwrap_or_default();
    let answer = RawAnswer::text(text);

    let Some(annotations) = message.annotations else {
        return Ok(answer);
    };

    let sources: Vec<SourceRef> = annotations
        .into_iter()
        .filter(|a| a.kind == "url_citation")
        .filter_map(|a| a.url_citation)
        .map(|c| SourceRef {
            url: c.url,
            title: c.title,
        })
        .collect();

    // Plain models send an empty annotation array; that says nothing about sources.
    if sources.is_empty() {
        Ok(answer)
    } else {
        Ok(answer.with_sources(sources))
    }
}
