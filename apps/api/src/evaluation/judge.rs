//! LLM rubric judge — asks the model to score an output per dimension, then
//! folds the scores with `score_rubric`. An unusable reply yields neutral
//! scores and `degraded: true`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::blueprint::spec::PromptSpec;
use crate::evaluation::prompts::{JUDGE_PROMPT_TEMPLATE, JUDGE_SYSTEM};
use crate::evaluation::rubric::{score_rubric, RubricReport, DIMENSIONS};
use crate::llm_client::extract::parse_json_lenient;
use crate::llm_client::template::fill_template;
use crate::llm_client::{CompletionBackend, CompletionRequest, LlmError, Provider, UsageRecord};

const JUDGE_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, Serialize)]
pub struct Judgement {
    pub report: RubricReport,
    pub feedback: Option<String>,
    pub degraded: bool,
    #[serde(skip)]
    pub usage: Option<UsageRecord>,
}

#[derive(Debug, Deserialize)]
struct RawJudgement {
    scores: HashMap<String, Value>,
    #[serde(default)]
    feedback: Option<String>,
}

pub fn build_judge_prompt(spec: &PromptSpec, output: &str) -> String {
    let dimensions = DIMENSIONS
        .iter()
        .map(|d| format!("- {}: {}", d.key, d.description))
        .collect::<Vec<_>>()
        .join("\n");

    fill_template(
        JUDGE_PROMPT_TEMPLATE,
        &[
            ("dimensions", dimensions.as_str()),
            ("tone", spec.settings.tone.as_str()),
            ("format", spec.settings.format.as_str()),
            ("length", spec.settings.length.as_str()),
            ("intent", spec.intent.trim()),
            ("output", output),
        ],
    )
}

/// Extracts numeric scores. Non-numeric values are left out so the rubric
/// treats them as missing.
pub fn parse_judge_reply(text: &str) -> Result<(HashMap<String, f64>, Option<String>), String> {
    let raw: RawJudgement = parse_json_lenient(text, "scores")?;
    let scores = raw
        .scores
        .into_iter()
        .filter_map(|(key, value)| {
            let score = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }?;
            Some((key, score))
        })
        .collect();
    let feedback = raw.feedback.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());
    Ok((scores, feedback))
}

fn neutral(usage: Option<UsageRecord>) -> Judgement {
    Judgement {
        report: score_rubric(&HashMap::new()),
        feedback: None,
        degraded: true,
        usage,
    }
}

/// Judges `output` against `spec`. Only a missing provider key is an error.
pub async fn judge_output(
    backend: &dyn CompletionBackend,
    spec: &PromptSpec,
    output: &str,
    provider: Option<Provider>,
) -> Result<Judgement, LlmError> {
    let request = CompletionRequest::new(build_judge_prompt(spec, output), JUDGE_SYSTEM)
        .with_provider(provider)
        .with_temperature(JUDGE_TEMPERATURE);

    let completion = match backend.complete(&request).await {
        Ok(c) => c,
        Err(e @ LlmError::MissingKey(_)) => return Err(e),
        Err(e) => {
            warn!("Judge call failed, using neutral scores: {e}");
            return Ok(neutral(None));
        }
    };
    let usage = Some(UsageRecord::from(&completion));

    match parse_judge_reply(&completion.text) {
        Ok((scores, feedback)) => Ok(Judgement {
            report: score_rubric(&scores),
            feedback,
            degraded: false,
            usage,
        }),
        Err(reason) => {
            warn!("Unparseable judge reply, using neutral scores: {reason}");
            Ok(neutral(usage))
        }
    }
}
