//! Verbalized Sampling — asks the model for several self-scored candidates in
//! one reply and parses them defensively. Never fails on a bad reply: the
//! result carries `success: false` and the reason instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::blueprint::vocab::Tone;
use crate::llm_client::extract::parse_json_lenient;
use crate::llm_client::template::fill_template;
use crate::llm_client::{CompletionBackend, CompletionRequest, LlmError, Provider, UsageRecord};
use crate::sampling::diversity::{clamp_probability, DiversityLabel, DiversityLevel};
use crate::sampling::prompts::{VS_PROMPT_TEMPLATE, VS_SYSTEM};

#[derive(Debug, Clone)]
pub struct SamplingInput {
    pub prompt: String,
    pub tone: Tone,
    pub output_type: String,
    pub level: DiversityLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampledOption {
    pub text: String,
    pub probability: f64,
    pub label: DiversityLabel,
    pub rationale: String,
    /// Whether the probability reaches the level's threshold.
    pub meets_threshold: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VsResult {
    pub success: bool,
    pub level: DiversityLevel,
    pub options: Vec<SampledOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub usage: Option<UsageRecord>,
}

impl VsResult {
    fn failed(level: DiversityLevel, error: impl Into<String>) -> Self {
        Self {
            success: false,
            level,
            options: Vec::new(),
            error: Some(error.into()),
            usage: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawReply {
    options: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(default, alias = "content", alias = "response")]
    text: Option<String>,
    #[serde(default)]
    probability: Option<Value>,
    #[serde(default, alias = "reasoning")]
    rationale: Option<String>,
}

/// Numbers pass through; numeric strings parse; anything else is 0.
fn probability_of(raw: Option<&Value>) -> f64 {
    let p = match raw {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().map_or(0.0, |v| {
            if s.trim().ends_with('%') {
                v / 100.0
            } else {
                v
            }
        }),
        _ => 0.0,
    };
    clamp_probability(p)
}

pub fn build_vs_prompt(input: &SamplingInput) -> String {
    let count = input.level.candidates().to_string();
    let threshold = format!("{:.2}", input.level.threshold());
    fill_template(
        VS_PROMPT_TEMPLATE,
        &[
            ("count", count.as_str()),
            ("threshold", threshold.as_str()),
            ("tone", input.tone.as_str()),
            ("output_type", input.output_type.as_str()),
            ("prompt", input.prompt.trim()),
        ],
    )
}

/// Parses a model reply: clamps probabilities, drops empty options, sorts
/// descending, keeps at most the level's candidate count.
pub fn parse_vs_response(text: &str, level: DiversityLevel) -> VsResult {
    let reply = match parse_json_lenient::<RawReply>(text, "options") {
        Ok(r) => r,
        Err(reason) => {
            warn!("Unparseable sampling reply: {reason}");
            return VsResult::failed(level, format!("Could not parse sampling reply: {reason}"));
        }
    };

    let threshold = level.threshold();
    let mut options: Vec<SampledOption> = reply
        .options
        .into_iter()
        .filter_map(|raw| {
            let text = raw.text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let probability = probability_of(raw.probability.as_ref());
            Some(SampledOption {
                text,
                probability,
                label: DiversityLabel::for_probability(probability),
                rationale: raw.rationale.unwrap_or_default().trim().to_string(),
                meets_threshold: probability >= threshold,
            })
        })
        .collect();

    if options.is_empty() {
        return VsResult::failed(level, "Sampling reply contained no usable options");
    }

    options.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    options.truncate(level.candidates());
    debug!("Parsed {} sampling options at level {:?}", options.len(), level);

    VsResult {
        success: true,
        level,
        options,
        error: None,
        usage: None,
    }
}

/// Runs one sampling round. Only a missing provider key is an error.
pub async fn run_verbalized_sampling(
    backend: &dyn CompletionBackend,
    input: &SamplingInput,
    provider: Option<Provider>,
) -> Result<VsResult, LlmError> {
    let request = CompletionRequest::new(build_vs_prompt(input), VS_SYSTEM)
        .with_provider(provider)
        .with_temperature(input.level.temperature());

    match backend.complete(&request).await {
        Ok(completion) => {
            let mut result = parse_vs_response(&completion.text, input.level);
            result.usage = Some(UsageRecord::from(&completion));
            Ok(result)
        }
        Err(e @ LlmError::MissingKey(_)) => Err(e),
        Err(e) => {
            warn!("Sampling call failed: {e}");
            Ok(VsResult::failed(input.level, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::StubBackend;

    const REPLY: &str = r#"{"options":[
        {"text":"Quiet confidence","probability":0.12,"rationale":"understated"},
        {"text":"Bold launch","probability":0.45,"rationale":"direct"},
        {"text":"Story-led","probability":0.2,"rationale":"narrative"}
    ]}"#;

    fn input(level: DiversityLevel) -> SamplingInput {
        SamplingInput {
            prompt: "Tagline for a coffee subscription".to_string(),
            tone: Tone::Creative,
            output_type: "tagline".to_string(),
            level,
        }
    }

    #[test]
    fn test_prompt_carries_level_parameters() {
        let prompt = build_vs_prompt(&input(DiversityLevel::Balanced));
        assert!(prompt.contains("Generate 4 distinct responses"));
        assert!(prompt.contains("at\nleast 0.20"));
        assert!(prompt.contains("creative tone"));
        assert!(prompt.contains("Tagline for a coffee subscription"));
    }

    #[test]
    fn test_output_type_with_braces_is_kept_verbatim() {
        let mut input = input(DiversityLevel::Focused);
        input.output_type = "{prompt} template".to_string();
        let prompt = build_vs_prompt(&input);
        assert!(prompt.contains("complete {prompt} template written"));
        assert!(prompt.ends_with("Tagline for a coffee subscription"));
        assert!(prompt.contains(r#""options""#));
    }

    #[test]
    fn test_parse_sorts_and_labels() {
        let result = parse_vs_response(REPLY, DiversityLevel::Wild);
        assert!(result.success);
        let texts: Vec<_> = result.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["Bold launch", "Story-led", "Quiet confidence"]);
        assert_eq!(result.options[0].label, DiversityLabel::SafeBet);
        assert_eq!(result.options[1].label, DiversityLabel::AlternativeAngle);
        assert_eq!(result.options[2].label, DiversityLabel::CreativeOutOfBox);
    }

    #[test]
    fn test_fenced_reply_parses_like_raw() {
        let raw = parse_vs_response(REPLY, DiversityLevel::Wild);
        let fenced = parse_vs_response(&format!("```json\n{REPLY}\n```"), DiversityLevel::Wild);
        let probs = |r: &VsResult| r.options.iter().map(|o| o.probability).collect::<Vec<_>>();
        assert!(fenced.success);
        assert_eq!(probs(&raw), probs(&fenced));
    }

    #[test]
    fn test_embedded_reply_parses() {
        let text = format!("Here are my options:\n{REPLY}\nHope that helps!");
        assert_eq!(parse_vs_response(&text, DiversityLevel::Wild).options.len(), 3);
    }

    #[test]
    fn test_malformed_reply_fails_softly() {
        let result = parse_vs_response("{\"options\": [ {\"text\": ", DiversityLevel::Focused);
        assert!(!result.success);
        assert!(result.options.is_empty());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_probabilities_clamped_and_defaulted() {
        let text = r#"{"options":[
            {"text":"a","probability":1.8},
            {"text":"b","probability":-0.3},
            {"text":"c"},
            {"text":"d","probability":"25%"}
        ]}"#;
        let result = parse_vs_response(text, DiversityLevel::Wild);
        let probs: Vec<f64> = result.options.iter().map(|o| o.probability).collect();
        assert_eq!(probs, vec![1.0, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_text_dropped_and_truncated() {
        let text = r#"{"options":[
            {"text":"  ","probability":0.9},
            {"content":"one","probability":0.5},
            {"text":"two","probability":0.4},
            {"text":"three","probability":0.35},
            {"text":"four","probability":0.3}
        ]}"#;
        let result = parse_vs_response(text, DiversityLevel::Focused);
        let texts: Vec<_> = result.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_all_options_empty_is_failure() {
        let result = parse_vs_response(r#"{"options":[{"text":""}]}"#, DiversityLevel::Wild);
        assert!(!result.success);
    }

    #[test]
    fn test_threshold_flag() {
        let result = parse_vs_response(REPLY, DiversityLevel::Focused);
        assert!(result.options[0].meets_threshold);
        assert!(!result.options[1].meets_threshold);
    }

    #[tokio::test]
    async fn test_run_records_usage() {
        let backend = StubBackend::fixed(REPLY);
        let result = run_verbalized_sampling(&backend, &input(DiversityLevel::Diverse), None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.usage.unwrap().model, "stub");
    }

    #[tokio::test]
    async fn test_run_transport_failure_is_soft() {
        let backend = StubBackend::failing();
        let result = run_verbalized_sampling(&backend, &input(DiversityLevel::Wild), None)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.options.is_empty());
    }
}
