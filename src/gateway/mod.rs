//! Judgment oracle gateway: the only remote boundary of the ranking core.

pub mod error;
pub mod openai;
pub mod types;

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::config::{validate_api_key, OracleConfig};
use crate::prompts::PromptInstance;
use openai::{ChatProvider, OpenAiAdapter};

pub use error::{ErrorContext, ProviderError};
pub use types::*;

/// The external judge: turns a rendered prompt into raw reply text.
///
/// Implementations may fail; callers recover from every error locally.
#[async_trait::async_trait]
pub trait JudgeOracle: Send + Sync {
    async fn judge(
        &self,
        prompt: &PromptInstance,
        max_output_tokens: u32,
    ) -> Result<String, ProviderError>;

    /// Checked once per pairwise comparison before any judgment is issued.
    fn validate_credentials(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Chat-completions backed oracle with retry and backoff.
pub struct ProviderGateway<P: ChatProvider = OpenAiAdapter> {
    provider: P,
    api_key: String,
    model: String,
    temperature: f32,
    json_mode: bool,
    config: GatewayConfig,
}

impl ProviderGateway<OpenAiAdapter> {
    pub fn from_config(oracle: &OracleConfig) -> Result<Self, ProviderError> {
        let provider = OpenAiAdapter::from_config(oracle)?;
        Ok(Self {
            provider,
            api_key: oracle.api_key.clone(),
            model: oracle.model.clone(),
            temperature: oracle.temperature,
            json_mode: oracle.json_mode,
            config: GatewayConfig {
                max_retries: oracle.max_retries,
                retry_base_delay: oracle.retry_base_delay,
            },
        })
    }
}

impl<P: ChatProvider> ProviderGateway<P> {
    pub fn with_provider(
        provider: P,
        api_key: impl Into<String>,
        model: impl Into<String>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.2,
            json_mode: true,
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.provider.chat(&req).await {
                Ok(resp) => {
                    debug!(
                        model = %req.model,
                        input_tokens = resp.input_tokens,
                        output_tokens = resp.output_tokens,
                        latency_ms = resp.latency.as_millis() as u64,
                        "oracle call succeeded"
                    );
                    return Ok(resp);
                }
                Err(err) => {
                    debug!(model = %req.model, attempt, code = err.code(), error = %err, "oracle call failed");
                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }
                    let delay = match &err {
                        ProviderError::RateLimited { retry_after, .. } => {
                            (*retry_after).min(backoff_delay(self.config.retry_base_delay, 5))
                        }
                        _ => backoff_delay(self.config.retry_base_delay, attempt),
                    };
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::provider("openai", "unknown error", false)))
    }
}

#[async_trait::async_trait]
impl<P: ChatProvider> JudgeOracle for ProviderGateway<P> {
    async fn judge(
        &self,
        prompt: &PromptInstance,
        max_output_tokens: u32,
    ) -> Result<String, ProviderError> {
        let mut request = ChatRequest::new(self.model.clone(), prompt.to_messages())
            .temperature(self.temperature)
            .max_tokens(max_output_tokens);
        if self.json_mode {
            request = request.json();
        }
        let response = self.chat(request).await?;
        Ok(response.content)
    }

    fn validate_credentials(&self) -> Result<(), ProviderError> {
        validate_api_key(&self.api_key)
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u32.pow(attempt.min(5));
    base * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 9), Duration::from_millis(3200));
    }
}
