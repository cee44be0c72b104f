//! Answer engine implementations.

mod openai;
mod perplexity;
mod rate_limited;
mod tavily;

pub use openai::OpenAiEngine;
pub use perplexity::PerplexityEngine;
pub use rate_limited::{AnswerEngineExt, RateLimitedEngine};
pub use tavily::TavilyEngine;

use reqwest::StatusCode;
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult, EngineCallResult, EngineError};
use crate::security::SecretString;
use crate::traits::engine::AnswerEngine;
use crate::types::engine::EngineConfig;

/// Instruction sent ahead of every question to chat-style engines.
pub(crate) const ANSWER_INSTRUCTION: &str = "Answer the user's question concisely. \
Cite the web pages you relied on as full URLs.";

/// Build the adapter matching an engine id (`openai`, `perplexity`, `tavily`).
///
/// Applies a request-rate quota when the config declares one.
pub fn from_config(config: EngineConfig) -> ConfigResult<Arc<dyn AnswerEngine>> {
    let id = config.id.as_str().to_string();
    let rps = config.requests_per_second;

    let engine: Arc<dyn AnswerEngine> = match (id.as_str(), rps) {
        ("openai", None) => Arc::new(OpenAiEngine::new(config)),
        ("openai", Some(rps)) => Arc::new(OpenAiEngine::new(config).rate_limited(rps)),
        ("perplexity", None) => Arc::new(PerplexityEngine::new(config)),
        ("perplexity", Some(rps)) => Arc::new(PerplexityEngine::new(config).rate_limited(rps)),
        ("tavily", None) => Arc::new(TavilyEngine::new(config)),
        ("tavily", Some(rps)) => Arc::new(TavilyEngine::new(config).rate_limited(rps)),
        (other, _) => return Err(ConfigError::UnknownEngine(other.to_string())),
    };

    Ok(engine)
}

/// Credentials for an engine, or an auth failure if none were configured.
pub(crate) fn api_key(config: &EngineConfig) -> EngineCallResult<&SecretString> {
    config
        .api_key
        .as_ref()
        .ok_or_else(|| EngineError::Auth(format!("no API key configured for {}", config.id)))
}

/// Base URL from config, or the engine's public endpoint.
pub(crate) fn endpoint<'a>(config: &'a EngineConfig, default: &'a str) -> &'a str {
    config
        .endpoint
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
}

/// Turn a non-success HTTP response into the matching engine error.
pub(crate) async fn error_for_status(response: reqwest::Response) -> EngineError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(status, body)
}

fn classify_status(status: StatusCode, body: String) -> EngineError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EngineError::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => EngineError::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => EngineError::Timeout,
        s if s.is_server_error() => EngineError::Transport(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("engine returned {}: {}", s, body),
        ))),
        s => EngineError::Api(format!("{}: {}", s, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "nope".into()),
            EngineError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            EngineError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::GATEWAY_TIMEOUT, String::new()),
            EngineError::Timeout
        ));
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_retryable());
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad model".into()),
            EngineError::Api(_)
        ));
    }

    #[test]
    fn test_from_config_rejects_unknown_engine() {
        let err = from_config(EngineConfig::new("altavista")).err();
        assert_eq!(err, Some(ConfigError::UnknownEngine("altavista".into())));
    }

    #[test]
    fn test_from_config_builds_known_engines() {
        for id in ["openai", "perplexity", "tavily"] {
            let engine = from_config(EngineConfig::new(id).with_rate_limit(2))
                .ok()
                .expect("known engine id");
            assert_eq!(engine.config().id.as_str(), id);
        }
    }

    #[test]
    fn test_missing_key_is_auth_failure() {
        let config = EngineConfig::new("openai");
        assert!(matches!(api_key(&config), Err(EngineError::Auth(_))));
    }

    #[test]
    fn test_endpoint_override() {
        let config = EngineConfig::new("openai").with_endpoint("http://localhost:9000/v1/");
        assert_eq!(endpoint(&config, "https://api.openai.com/v1"), "http://localhost:9000/v1");
        assert_eq!(
            endpoint(&EngineConfig::new("openai"), "https://api.openai.com/v1"),
            "https://api.openai.com/v1"
        );
    }
}
