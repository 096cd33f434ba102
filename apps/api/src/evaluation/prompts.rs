// All LLM prompt constants for the Evaluation module.

/// System prompt for the rubric judge — enforces JSON-only output.
pub const JUDGE_SYSTEM: &str = "You are a strict, consistent editor who grades writing \
    against a rubric. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Rubric judge prompt template.
/// Replace: {dimensions}, {intent}, {tone}, {format}, {length}, {output}
pub const JUDGE_PROMPT_TEMPLATE: &str = r#"Grade the OUTPUT below against the request it was written for.

Score each dimension from 1 (poor) to 10 (excellent):
{dimensions}

Return a JSON object with this EXACT schema:
{
  "scores": {"clarity": 7, "specificity": 6, "tone_alignment": 8, "format_compliance": 9, "completeness": 7},
  "feedback": "one or two sentences on the biggest improvement"
}

REQUEST:
{intent}

REQUESTED STYLE: tone={tone}, format={format}, length={length}

OUTPUT:
{output}"#;
