//! Run configuration, resolved from explicit values or the environment.
//!
//! Nothing here is process-global: configs are built once and passed into the
//! gateway, judge and engine at construction.

use std::time::Duration;

use crate::gateway::ProviderError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Keys at or below this length are rejected before any call is made.
pub const MIN_API_KEY_LEN: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Connection settings for the judgment oracle.
#[derive(Clone)]
pub struct OracleConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
    pub temperature: f32,
    pub json_mode: bool,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("temperature", &self.temperature)
            .field("json_mode", &self.json_mode)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl OracleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            temperature: 0.2,
            json_mode: true,
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
        }
    }

    /// Read `OPENAI_API_KEY` plus optional `DOCRANK_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::Missing("OPENAI_API_KEY"))?;
        let mut config = Self::new(api_key);

        if let Ok(url) = std::env::var("DOCRANK_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("DOCRANK_MODEL") {
            config.model = model;
        }
        if let Some(secs) = env_parse::<u64>("DOCRANK_TIMEOUT_SECONDS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_parse::<u32>("DOCRANK_MAX_RETRIES")? {
            config.max_retries = retries;
        }
        Ok(config)
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Settings for one ranking run.
#[derive(Debug, Clone)]
pub struct RankConfig {
    /// Bounded wait for a single judgment; expiry becomes an error verdict.
    pub judge_timeout: Duration,
    /// Upper bound on in-flight oracle calls. 1 keeps the run strictly sequential.
    pub max_concurrency: usize,
    /// Combined request + response token budget per judgment.
    pub total_token_budget: usize,
    /// Floor for the response budget.
    pub min_response_tokens: u32,
    /// Ceiling for the response budget.
    pub max_response_tokens: u32,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            judge_timeout: Duration::from_secs(180),
            max_concurrency: 1,
            total_token_budget: 4096,
            min_response_tokens: 1000,
            max_response_tokens: 1500,
        }
    }
}

impl RankConfig {
    /// Defaults with `DOCRANK_JUDGE_TIMEOUT_SECONDS` / `DOCRANK_MAX_CONCURRENCY` applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(secs) = env_parse::<u64>("DOCRANK_JUDGE_TIMEOUT_SECONDS")? {
            config.judge_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_parse::<usize>("DOCRANK_MAX_CONCURRENCY")? {
            if n == 0 {
                return Err(ConfigError::Invalid {
                    name: "DOCRANK_MAX_CONCURRENCY",
                    value: "0".to_string(),
                });
            }
            config.max_concurrency = n;
        }
        Ok(config)
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn judge_timeout(mut self, timeout: Duration) -> Self {
        self.judge_timeout = timeout;
        self
    }
}

/// Shape check on the oracle credential, run before any pairwise comparison.
pub fn validate_api_key(api_key: &str) -> Result<(), ProviderError> {
    let key = api_key.trim();
    if key.is_empty() {
        return Err(ProviderError::config("API key is empty"));
    }
    if key.len() <= MIN_API_KEY_LEN {
        return Err(ProviderError::config(format!(
            "API key appears invalid (length {})",
            key.len()
        )));
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(None),
    }
}
