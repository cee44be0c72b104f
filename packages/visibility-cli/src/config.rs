use anyhow::{bail, Context, Result};
use citation_engine::{DispatchConfig, EngineConfig};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Engines the runner knows how to build, with the env var holding each key.
const ENGINE_KEYS: [(&str, &str); 3] = [
    ("openai", "OPENAI_API_KEY"),
    ("perplexity", "PERPLEXITY_API_KEY"),
    ("tavily", "TAVILY_API_KEY"),
];

/// Runner configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub engines: Vec<EngineConfig>,
    pub worker_limit: usize,
    pub call_timeout: Duration,
    pub batch_deadline: Option<Duration>,
    /// Requests per second applied to every engine, if set
    pub rate_limit: Option<u32>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let worker_limit = lookup("VISIBILITY_WORKERS")
            .unwrap_or_else(|| "8".to_string())
            .parse()
            .context("VISIBILITY_WORKERS must be a valid number")?;
        let call_timeout = Duration::from_secs(
            lookup("VISIBILITY_CALL_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .context("VISIBILITY_CALL_TIMEOUT_SECS must be a valid number")?,
        );
        let batch_deadline = lookup("VISIBILITY_BATCH_DEADLINE_SECS")
            .map(|v| v.parse().map(Duration::from_secs))
            .transpose()
            .context("VISIBILITY_BATCH_DEADLINE_SECS must be a valid number")?;
        let rate_limit = lookup("VISIBILITY_RATE_LIMIT")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("VISIBILITY_RATE_LIMIT must be a valid number")?;

        let engines: Vec<EngineConfig> = ENGINE_KEYS
            .iter()
            .filter_map(|(id, var)| {
                lookup(var)
                    .filter(|key| !key.trim().is_empty())
                    .map(|key| (*id, key))
            })
            .map(|(id, key)| {
                let config = EngineConfig::new(id)
                    .with_api_key(key)
                    .with_timeout(call_timeout);
                match rate_limit {
                    Some(rps) => config.with_rate_limit(rps),
                    None => config,
                }
            })
            .collect();

        if engines.is_empty() {
            bail!("at least one of OPENAI_API_KEY, PERPLEXITY_API_KEY or TAVILY_API_KEY must be set");
        }

        Ok(Self {
            engines,
            worker_limit,
            call_timeout,
            batch_deadline,
            rate_limit,
        })
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        let config = DispatchConfig::new().with_worker_limit(self.worker_limit);
        match self.batch_deadline {
            Some(deadline) => config.with_batch_deadline(deadline),
            None => config,
        }
    }
}
