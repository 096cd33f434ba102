//! Intent analysis — asks the LLM to infer tone / format / length for a draft
//! and merges the answer into a `PromptSpec`.

use serde::Serialize;
use tracing::{info, warn};

use crate::blueprint::prompts::{ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM};
use crate::blueprint::spec::{build_spec, InferredSpec, PromptSpec, SpecDraft};
use crate::blueprint::vocab::{Format, Length, Tone};
use crate::llm_client::extract::parse_json_lenient;
use crate::llm_client::template::fill_template;
use crate::llm_client::{CompletionBackend, CompletionRequest, LlmError, Provider, UsageRecord};

const ANALYSIS_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub spec: PromptSpec,
    /// True when the model's answer could not be used and defaults were applied.
    pub degraded: bool,
    #[serde(skip)]
    pub usage: Option<UsageRecord>,
}

fn joined<T: Copy>(values: &[T], as_str: fn(&T) -> &'static str) -> String {
    values.iter().map(as_str).collect::<Vec<_>>().join(", ")
}

pub fn build_analysis_prompt(draft: &SpecDraft) -> String {
    let tones = joined(&Tone::ALL, Tone::as_str);
    let formats = joined(&Format::ALL, Format::as_str);
    let lengths = joined(&Length::ALL, Length::as_str);
    fill_template(
        ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("tones", tones.as_str()),
            ("formats", formats.as_str()),
            ("lengths", lengths.as_str()),
            ("audience", draft.audience.as_deref().unwrap_or("")),
            ("context", draft.context.as_deref().unwrap_or("")),
            ("intent", draft.intent.trim()),
        ],
    )
}

fn degraded(draft: &SpecDraft, reason: &str, usage: Option<UsageRecord>) -> Analysis {
    let mut spec = build_spec(draft, None);
    spec.settings.reasoning = format!("Defaults applied: {reason}");
    Analysis {
        spec,
        degraded: true,
        usage,
    }
}

/// Infers settings for `draft`. Only a missing provider key is an error;
/// transport failures and unusable replies fall back to defaults.
pub async fn analyze_intent(
    backend: &dyn CompletionBackend,
    draft: &SpecDraft,
    provider: Option<Provider>,
) -> Result<Analysis, LlmError> {
    let request = CompletionRequest::new(build_analysis_prompt(draft), ANALYSIS_SYSTEM)
        .with_provider(provider)
        .with_temperature(ANALYSIS_TEMPERATURE);

    let completion = match backend.complete(&request).await {
        Ok(c) => c,
        Err(e @ LlmError::MissingKey(_)) => return Err(e),
        Err(e) => {
            warn!("Intent analysis call failed, using defaults: {e}");
            return Ok(degraded(draft, "the analysis service was unavailable", None));
        }
    };
    let usage = Some(UsageRecord::from(&completion));

    match parse_json_lenient::<InferredSpec>(&completion.text, "tone") {
        Ok(inferred) if !inferred.has_settings() => {
            warn!("Analysis reply carried no tone, format or length, using defaults");
            Ok(degraded(draft, "the analysis reply had no usable settings", usage))
        }
        Ok(inferred) => {
            let spec = build_spec(draft, Some(&inferred));
            info!(
                "Inferred spec: tone={}, format={}, length={}",
                spec.settings.tone, spec.settings.format, spec.settings.length
            );
            Ok(Analysis {
                spec,
                degraded: false,
                usage,
            })
        }
        Err(reason) => {
            warn!("Unparseable analysis reply, using defaults: {reason}");
            Ok(degraded(draft, "the analysis reply could not be parsed", usage))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::StubBackend;

    fn draft() -> SpecDraft {
        SpecDraft {
            intent: "Announce our new pricing to existing customers".to_string(),
            audience: Some("small business owners".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_prompt_lists_vocabularies_and_inputs() {
        let prompt = build_analysis_prompt(&draft());
        assert!(prompt.contains("bullet_points"));
        assert!(prompt.contains("comprehensive"));
        assert!(prompt.contains("empathetic"));
        assert!(prompt.contains("Announce our new pricing"));
        assert!(prompt.contains("small business owners"));
        assert!(!prompt.contains("{intent}"));
    }

    #[tokio::test]
    async fn test_fenced_reply_is_merged() {
        let backend = StubBackend::fixed(
            "```json\n{\"tone\":\"friendly\",\"format\":\"email\",\"length\":\"short\",\
             \"reasoning\":\"Customer update\",\"type_specific\":[\"Lead with the benefit\"]}\n```",
        );
        let analysis = analyze_intent(&backend, &draft(), None).await.unwrap();
        assert!(!analysis.degraded);
        assert_eq!(analysis.spec.settings.tone, Tone::Friendly);
        assert_eq!(analysis.spec.settings.format, Format::Email);
        assert_eq!(analysis.spec.type_specific, vec!["Lead with the benefit"]);
        assert_eq!(analysis.usage.unwrap().usage.input_tokens, 10);
    }

    #[test]
    fn test_prompt_keeps_placeholder_text_in_inputs() {
        let draft = SpecDraft {
            intent: "Explain {context} blocks in our template engine".to_string(),
            audience: Some("people who write {intent}".to_string()),
            context: Some("v2 syntax".to_string()),
            ..Default::default()
        };
        let prompt = build_analysis_prompt(&draft);
        assert!(prompt.contains("Explain {context} blocks"));
        assert!(prompt.contains("people who write {intent}"));
        assert!(prompt.contains("v2 syntax"));
    }

    #[tokio::test]
    async fn test_json_reply_without_settings_degrades() {
        let backend = StubBackend::fixed(r#"{"error":"model overloaded"}"#);
        let analysis = analyze_intent(&backend, &draft(), None).await.unwrap();
        assert!(analysis.degraded);
        assert_eq!(
            analysis.spec.settings.reasoning,
            "Defaults applied: the analysis reply had no usable settings"
        );
        assert!(analysis.usage.is_some());
    }

    #[tokio::test]
    async fn test_blank_settings_reply_degrades() {
        let backend = StubBackend::fixed(r#"{"tone":" ","format":"","reasoning":"n/a"}"#);
        let analysis = analyze_intent(&backend, &draft(), None).await.unwrap();
        assert!(analysis.degraded);
    }

    #[tokio::test]
    async fn test_garbage_reply_degrades_to_defaults() {
        let backend = StubBackend::fixed("I think a friendly tone would work.");
        let analysis = analyze_intent(&backend, &draft(), None).await.unwrap();
        assert!(analysis.degraded);
        assert_eq!(analysis.spec.settings.tone, Tone::default());
        assert!(analysis.spec.settings.reasoning.starts_with("Defaults applied"));
        assert!(analysis.usage.is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_degrades() {
        let backend = StubBackend::failing();
        let analysis = analyze_intent(&backend, &draft(), None).await.unwrap();
        assert!(analysis.degraded);
        assert!(analysis.usage.is_none());
        assert_eq!(analysis.spec.audience.as_deref(), Some("small business owners"));
    }

    #[tokio::test]
    async fn test_missing_key_is_an_error() {
        let backend = StubBackend::new(|_| Err(LlmError::MissingKey(Provider::Gemini)));
        let err = analyze_intent(&backend, &draft(), Some(Provider::Gemini))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingKey(Provider::Gemini)));
    }
}
