// All LLM prompt constants for the Sampling module.

/// System prompt for Verbalized Sampling — enforces JSON-only output.
pub const VS_SYSTEM: &str = "You are a versatile writer who explores several distinct \
    interpretations of a request and estimates how likely each one is. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Verbalized Sampling prompt template.
/// Replace: {count}, {threshold}, {tone}, {output_type}, {prompt}
pub const VS_PROMPT_TEMPLATE: &str = r#"Generate {count} distinct responses to the request below.
Each response is a complete {output_type} written in a {tone} tone.

For every response, estimate the probability (0.0 to 1.0) that a typical
writer would produce it. Only include responses whose probability is at
least {threshold}. Make the responses genuinely different from each other.

Return a JSON object with this EXACT schema:
{
  "options": [
    {
      "text": "the full response",
      "probability": 0.42,
      "rationale": "one sentence on what makes this angle different"
    }
  ]
}

REQUEST:
{prompt}"#;
