//! Provider credit balance lookup.
//!
//! Only OpenAI exposes a balance endpoint reachable with an API key.
//! Anthropic and Gemini balances are entered manually and stored with the key.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{LlmClient, LlmError, Provider};

const OPENAI_CREDIT_GRANTS_URL: &str = "https://api.openai.com/dashboard/billing/credit_grants";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    Api,
    Manual,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReport {
    pub provider: Provider,
    pub amount_usd: Option<f64>,
    pub source: BalanceSource,
}

#[derive(Debug, Deserialize)]
struct CreditGrants {
    total_available: f64,
}

pub fn supports_balance_lookup(provider: Provider) -> bool {
    matches!(provider, Provider::OpenAi)
}

impl LlmClient {
    /// Queries the provider's balance endpoint. Errors for providers without one.
    pub async fn fetch_balance(&self, provider: Provider) -> Result<f64, LlmError> {
        if !supports_balance_lookup(provider) {
            return Err(LlmError::Api {
                status: 501,
                message: format!("{provider} has no balance endpoint"),
            });
        }
        let api_key = self.key_for(provider).ok_or(LlmError::MissingKey(provider))?;

        let response = self
            .http()
            .get(OPENAI_CREDIT_GRANTS_URL)
            .bearer_auth(api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let grants: CreditGrants = serde_json::from_str(&body)?;
        Ok(grants.total_available)
    }

    /// Best-effort balance: API lookup where supported, otherwise the manually
    /// entered figure. Lookup failures fall back to the manual value.
    pub async fn resolve_balance(&self, provider: Provider, manual: Option<f64>) -> BalanceReport {
        if supports_balance_lookup(provider) && self.key_for(provider).is_some() {
            match self.fetch_balance(provider).await {
                Ok(amount) => {
                    return BalanceReport {
                        provider,
                        amount_usd: Some(amount),
                        source: BalanceSource::Api,
                    }
                }
                Err(e) => warn!("Balance lookup for {provider} failed, using manual value: {e}"),
            }
        }
        manual_report(provider, manual)
    }
}

fn manual_report(provider: Provider, manual: Option<f64>) -> BalanceReport {
    BalanceReport {
        provider,
        amount_usd: manual,
        source: if manual.is_some() {
            BalanceSource::Manual
        } else {
            BalanceSource::Unavailable
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_only_openai_supports_lookup() {
        assert!(supports_balance_lookup(Provider::OpenAi));
        assert!(!supports_balance_lookup(Provider::Anthropic));
        assert!(!supports_balance_lookup(Provider::Gemini));
    }

    #[test]
    fn test_manual_report_source() {
        assert_eq!(manual_report(Provider::Gemini, Some(3.5)).source, BalanceSource::Manual);
        assert_eq!(manual_report(Provider::Gemini, None).source, BalanceSource::Unavailable);
    }

    #[tokio::test]
    async fn test_resolve_balance_uses_manual_for_anthropic() {
        let client = LlmClient::new(
            HashMap::from([(Provider::Anthropic, "k".to_string())]),
            Provider::Anthropic,
        )
        .unwrap();
        let report = client.resolve_balance(Provider::Anthropic, Some(12.0)).await;
        assert_eq!(report.amount_usd, Some(12.0));
        assert_eq!(report.source, BalanceSource::Manual);
    }

    #[tokio::test]
    async fn test_fetch_balance_rejects_unsupported_provider() {
        let client = LlmClient::new(HashMap::new(), Provider::Gemini).unwrap();
        assert!(client.fetch_balance(Provider::Gemini).await.is_err());
    }
}
