// All LLM prompt constants for the Blueprint module.

/// System prompt for intent analysis — enforces JSON-only output.
pub const ANALYSIS_SYSTEM: &str = "You are an expert prompt engineer. \
    Infer the writing settings that best fit a user's stated intent. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Intent analysis prompt template.
/// Replace: {intent}, {audience}, {context}, {tones}, {formats}, {lengths}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the request below and infer how the output should be written.

Return a JSON object with this EXACT schema:
{
  "tone": "professional",
  "format": "paragraph",
  "length": "medium",
  "audience": "who will read the output",
  "output_type": "what is being produced, e.g. blog post, product description",
  "reasoning": "one or two sentences explaining the choices",
  "type_specific": ["short guidance specific to this kind of output"]
}

Allowed values (pick exactly one each):
- tone: {tones}
- format: {formats}
- length: {lengths}

Keep "type_specific" to at most 5 items.

REQUEST:
{intent}

AUDIENCE (may be empty):
{audience}

CONTEXT (may be empty):
{context}"#;
