use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::organization::UsageEventRow;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderUsage {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageSummary {
    pub total: ProviderUsage,
    /// Keyed by provider name; ordered for stable output.
    pub by_provider: BTreeMap<String, ProviderUsage>,
}

pub fn summarize_usage(events: &[UsageEventRow]) -> UsageSummary {
    let mut summary = UsageSummary::default();
    for event in events {
        let input = event.input_tokens.max(0) as u64;
        let output = event.output_tokens.max(0) as u64;
        for bucket in [
            &mut summary.total,
            summary.by_provider.entry(event.provider.clone()).or_default(),
        ] {
            bucket.calls += 1;
            bucket.input_tokens += input;
            bucket.output_tokens += output;
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(provider: &str, input: i32, output: i32) -> UsageEventRow {
        UsageEventRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            provider: provider.to_string(),
            model: "m".to_string(),
            operation: "sampling".to_string(),
            input_tokens: input,
            output_tokens: output,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summarize_groups_by_provider() {
        let summary = summarize_usage(&[
            event("openai", 100, 20),
            event("openai", 50, 10),
            event("gemini", 7, 3),
        ]);
        assert_eq!(summary.total.calls, 3);
        assert_eq!(summary.total.input_tokens, 157);
        assert_eq!(summary.by_provider["openai"].calls, 2);
        assert_eq!(summary.by_provider["openai"].output_tokens, 30);
        assert_eq!(summary.by_provider["gemini"].input_tokens, 7);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize_usage(&[]);
        assert_eq!(summary.total, ProviderUsage::default());
        assert!(summary.by_provider.is_empty());
    }

    #[test]
    fn test_negative_counts_are_ignored() {
        let summary = summarize_usage(&[event("anthropic", -5, 2)]);
        assert_eq!(summary.total.input_tokens, 0);
        assert_eq!(summary.total.output_tokens, 2);
    }
}
