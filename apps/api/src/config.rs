use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use crate::llm_client::Provider;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub default_provider: Provider,
    pub port: u16,
    pub rust_log: String,
    /// Max in-flight LLM calls per matrix experiment.
    pub experiment_concurrency: usize,
    /// Experiments expanding to more cells than this are rejected.
    pub max_matrix_cells: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let openai_api_key = optional_env("OPENAI_API_KEY");
        let anthropic_api_key = optional_env("ANTHROPIC_API_KEY");
        let gemini_api_key = optional_env("GEMINI_API_KEY");

        let default_provider = match optional_env("DEFAULT_PROVIDER") {
            Some(raw) => raw
                .parse::<Provider>()
                .map_err(|e| anyhow::anyhow!("DEFAULT_PROVIDER is invalid: {e}"))?,
            None => first_configured(
                anthropic_api_key.is_some(),
                openai_api_key.is_some(),
                gemini_api_key.is_some(),
            )
            .context("At least one of ANTHROPIC_API_KEY, OPENAI_API_KEY, GEMINI_API_KEY must be set")?,
        };

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            openai_api_key,
            anthropic_api_key,
            gemini_api_key,
            default_provider,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            experiment_concurrency: parse_env("EXPERIMENT_CONCURRENCY", 4usize)?.max(1),
            max_matrix_cells: parse_env("MAX_MATRIX_CELLS", 60)?,
        };

        if config.key_for(config.default_provider).is_none() {
            bail!(
                "DEFAULT_PROVIDER is '{}' but no API key is configured for it",
                config.default_provider
            );
        }

        Ok(config)
    }

    /// Returns the server-level API key configured for `provider`, if any.
    pub fn key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }

    /// Every configured server key, for building the shared `LlmClient`.
    pub fn provider_keys(&self) -> HashMap<Provider, String> {
        Provider::ALL
            .into_iter()
            .filter_map(|p| self.key_for(p).map(|k| (p, k.to_string())))
            .collect()
    }
}

/// Preference order when DEFAULT_PROVIDER is unset: anthropic, openai, gemini.
fn first_configured(anthropic: bool, openai: bool, gemini: bool) -> Option<Provider> {
    [
        (anthropic, Provider::Anthropic),
        (openai, Provider::OpenAi),
        (gemini, Provider::Gemini),
    ]
    .into_iter()
    .find_map(|(present, provider)| present.then_some(provider))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
