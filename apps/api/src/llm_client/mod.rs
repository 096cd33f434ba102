/// LLM Client — the single point of entry for all provider API calls in Blueprint.
///
/// ARCHITECTURAL RULE: No other module may call a provider API directly.
/// All LLM interactions MUST go through this module, usually via the
/// `CompletionBackend` trait so callers can be tested against a stub.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod balance;
pub mod extract;
mod providers;
pub mod template;
#[cfg(test)]
pub mod testing;

const DEFAULT_MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No API key configured for {0}")]
    MissingKey(Provider),
}

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Anthropic, Provider::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }

    /// Model used when a request does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Anthropic => "claude-sonnet-4-5",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// A single prompt/system pair sent to one provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: String,
    /// `None` uses the client's default provider.
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: system.into(),
            provider: None,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_provider(mut self, provider: Option<Provider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Normalized provider reply.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub text: String,
    pub provider: Provider,
    pub model: String,
    pub usage: Usage,
}

/// Provider, model and token totals for one logical operation
/// (a single call, or every call of an experiment).
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub provider: Provider,
    pub model: String,
    pub usage: Usage,
}

impl From<&Completion> for UsageRecord {
    fn from(c: &Completion) -> Self {
        Self {
            provider: c.provider,
            model: c.model.clone(),
            usage: c.usage,
        }
    }
}

/// Anything that can turn a `CompletionRequest` into text.
/// `LlmClient` is the production implementation.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

/// The single LLM client used by all services in Blueprint.
/// Wraps the OpenAI, Anthropic and Gemini APIs with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    keys: HashMap<Provider, String>,
    default_provider: Provider,
}

impl LlmClient {
    pub fn new(keys: HashMap<Provider, String>, default_provider: Provider) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            keys,
            default_provider,
        })
    }

    /// Returns a client whose keys are overlaid with `overrides`
    /// (organization-scoped keys win over server keys).
    pub fn with_key_overrides(&self, overrides: HashMap<Provider, String>) -> Self {
        let mut keys = self.keys.clone();
        keys.extend(overrides);
        Self {
            client: self.client.clone(),
            keys,
            default_provider: self.default_provider,
        }
    }

    pub fn default_provider(&self) -> Provider {
        self.default_provider
    }

    pub fn key_for(&self, provider: Provider) -> Option<&str> {
        self.keys.get(&provider).map(String::as_str)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Makes a call to the resolved provider, returning the normalized completion.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let provider = request.provider.unwrap_or(self.default_provider);
        let api_key = self.key_for(provider).ok_or(LlmError::MissingKey(provider))?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

        let body = providers::request_body(provider, &model, request, max_tokens)?;
        let url = providers::endpoint(provider, &model);

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "{provider} call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = providers::authorize(self.client.post(&url), provider, api_key);
            let response = match builder.json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("{provider} API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            let text = response.text().await?;

            if !status.is_success() {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: providers::error_message(text),
                });
            }

            let (content, usage) = providers::parse_completion(provider, &text)?;
            let content = content
                .filter(|c| !c.trim().is_empty())
                .ok_or(LlmError::EmptyContent)?;

            debug!(
                "{provider} call succeeded: model={model}, input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );

            return Ok(Completion {
                text: content,
                provider,
                model,
                usage,
            });
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.call(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(keys: &[(Provider, &str)]) -> LlmClient {
        let keys = keys
            .iter()
            .map(|(p, k)| (*p, k.to_string()))
            .collect::<HashMap<_, _>>();
        LlmClient::new(keys, Provider::Anthropic).unwrap()
    }

    #[test]
    fn test_provider_round_trips_through_str() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
    }

    #[test]
    fn test_provider_parse_is_case_insensitive() {
        assert_eq!(" OpenAI ".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("mistral".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_serde_matches_as_str() {
        let json = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn test_key_overrides_win_over_server_keys() {
        let client = client_with(&[(Provider::OpenAi, "server-key")]);
        let overridden = client.with_key_overrides(HashMap::from([
            (Provider::OpenAi, "org-key".to_string()),
            (Provider::Gemini, "org-gemini".to_string()),
        ]));
        assert_eq!(overridden.key_for(Provider::OpenAi), Some("org-key"));
        assert_eq!(overridden.key_for(Provider::Gemini), Some("org-gemini"));
        assert_eq!(client.key_for(Provider::OpenAi), Some("server-key"));
    }

    #[tokio::test]
    async fn test_call_without_key_fails_fast() {
        let client = client_with(&[]);
        let request = CompletionRequest::new("hi", "sys").with_provider(Some(Provider::Gemini));
        let err = client.call(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingKey(Provider::Gemini)));
    }

    #[test]
    fn test_usage_add_accumulates() {
        let mut total = Usage::default();
        total.add(Usage {
            input_tokens: 10,
            output_tokens: 5,
        });
        total.add(Usage {
            input_tokens: 1,
            output_tokens: 2,
        });
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.output_tokens, 7);
    }
}
