//! Organization settings, API key masking and balance alerts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::llm_client::balance::BalanceReport;
use crate::llm_client::Provider;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Shared keys stored on the organization are used for every member.
    #[default]
    Organization,
    /// Members bring their own keys; organization keys are ignored.
    Personal,
}

/// Stored as JSONB on `organizations.settings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationSettings {
    #[serde(default)]
    pub key_policy: KeyPolicy,
    /// Alert when a provider's balance (USD) drops below this value.
    #[serde(default)]
    pub alert_thresholds: HashMap<Provider, f64>,
}

impl OrganizationSettings {
    /// Unknown or malformed settings documents degrade to defaults.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::warn!("Organization settings unreadable, using defaults: {e}");
            Self::default()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceAlert {
    pub provider: Provider,
    pub balance_usd: f64,
    pub threshold_usd: f64,
}

/// Masks a key down to its prefix and last four characters, e.g. `sk-…abcd`.
/// Keys of eight characters or fewer are fully masked.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "…".to_string();
    }
    let prefix: String = match key.find('-') {
        Some(i) if i <= 4 => key[..=i].to_string(),
        _ => String::new(),
    };
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}…{tail}")
}

/// Flags each provider whose known balance is below its threshold.
/// Providers without a balance or without a threshold never alert.
pub fn evaluate_alerts(
    balances: &[BalanceReport],
    thresholds: &HashMap<Provider, f64>,
) -> Vec<BalanceAlert> {
    balances
        .iter()
        .filter_map(|b| {
            let balance = b.amount_usd?;
            let threshold = *thresholds.get(&b.provider)?;
            (balance < threshold).then_some(BalanceAlert {
                provider: b.provider,
                balance_usd: balance,
                threshold_usd: threshold,
            })
        })
        .collect()
}
