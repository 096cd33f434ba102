//! Per-provider wire formats. Each provider gets a request body, an endpoint,
//! an auth header and a response parser; `LlmClient::call` stays uniform.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmError, Provider, Usage};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// ────────────────────────────────────────────────────────────────────────────
// Request bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Serializes the provider-specific request body.
pub(super) fn request_body(
    provider: Provider,
    model: &str,
    request: &CompletionRequest,
    max_tokens: u32,
) -> Result<serde_json::Value, LlmError> {
    let value = match provider {
        Provider::OpenAi => serde_json::to_value(OpenAiRequest {
            model,
            max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
        })?,
        Provider::Anthropic => serde_json::to_value(AnthropicRequest {
            model,
            max_tokens,
            system: &request.system,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        })?,
        Provider::Gemini => serde_json::to_value(GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &request.system,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: max_tokens,
                temperature: request.temperature,
            },
        })?,
    };
    Ok(value)
}

pub(super) fn endpoint(provider: Provider, model: &str) -> String {
    match provider {
        Provider::OpenAi => OPENAI_CHAT_URL.to_string(),
        Provider::Anthropic => ANTHROPIC_MESSAGES_URL.to_string(),
        Provider::Gemini => format!("{GEMINI_BASE_URL}/{model}:generateContent"),
    }
}

pub(super) fn authorize(builder: RequestBuilder, provider: Provider, api_key: &str) -> RequestBuilder {
    let builder = builder.header("content-type", "application/json");
    match provider {
        Provider::OpenAi => builder.bearer_auth(api_key),
        Provider::Anthropic => builder
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION),
        Provider::Gemini => builder.header("x-goog-api-key", api_key),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// Extracts the text content and usage from a successful response body.
/// Text blocks are concatenated; a reply with no text yields `None`.
pub(super) fn parse_completion(
    provider: Provider,
    body: &str,
) -> Result<(Option<String>, Usage), LlmError> {
    match provider {
        Provider::OpenAi => {
            let response: OpenAiResponse = serde_json::from_str(body)?;
            let text = response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content);
            let usage = response
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default();
            Ok((text, usage))
        }
        Provider::Anthropic => {
            let response: AnthropicResponse = serde_json::from_str(body)?;
            let text = join_text(
                response
                    .content
                    .into_iter()
                    .filter(|b| b.block_type == "text")
                    .filter_map(|b| b.text),
            );
            let usage = response
                .usage
                .map(|u| Usage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                })
                .unwrap_or_default();
            Ok((text, usage))
        }
        Provider::Gemini => {
            let response: GeminiResponse = serde_json::from_str(body)?;
            let text = response
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .and_then(|c| join_text(c.parts.into_iter().filter_map(|p| p.text)));
            let usage = response
                .usage_metadata
                .map(|u| Usage {
                    input_tokens: u.prompt_token_count,
                    output_tokens: u.candidates_token_count,
                })
                .unwrap_or_default();
            Ok((text, usage))
        }
    }
}

fn join_text(parts: impl Iterator<Item = String>) -> Option<String> {
    let joined: String = parts.collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// All three providers wrap errors as `{"error": {"message": ...}}`.
pub(super) fn error_message(body: String) -> String {
    serde_json::from_str::<ProviderError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest::new("write a haiku", "be brief").with_temperature(0.9)
    }

    #[test]
    fn test_openai_body_puts_system_first() {
        let body = request_body(Provider::OpenAi, "gpt-4o", &request(), 512).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["content"], "write a haiku");
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn test_anthropic_body_uses_top_level_system() {
        let body = request_body(Provider::Anthropic, "claude-sonnet-4-5", &request(), 100).unwrap();
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_gemini_body_is_camel_case() {
        let body = request_body(Provider::Gemini, "gemini-2.0-flash", &request(), 64).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 64);
    }

    #[test]
    fn test_temperature_omitted_when_unset() {
        let req = CompletionRequest::new("p", "s");
        let body = request_body(Provider::OpenAi, "gpt-4o", &req, 10).unwrap();
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_gemini_endpoint_embeds_model() {
        assert!(endpoint(Provider::Gemini, "gemini-2.0-flash").ends_with("/gemini-2.0-flash:generateContent"));
    }

    #[test]
    fn test_parse_openai_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}],
                      "usage":{"prompt_tokens":12,"completion_tokens":3}}"#;
        let (text, usage) = parse_completion(Provider::OpenAi, body).unwrap();
        assert_eq!(text.as_deref(), Some("hello"));
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 3);
    }

    #[test]
    fn test_parse_anthropic_skips_non_text_blocks() {
        let body = r#"{"content":[{"type":"thinking"},{"type":"text","text":"hi"}],
                      "usage":{"input_tokens":5,"output_tokens":1}}"#;
        let (text, usage) = parse_completion(Provider::Anthropic, body).unwrap();
        assert_eq!(text.as_deref(), Some("hi"));
        assert_eq!(usage.output_tokens, 1);
    }

    #[test]
    fn test_parse_gemini_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}],
                      "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":2}}"#;
        let (text, usage) = parse_completion(Provider::Gemini, body).unwrap();
        assert_eq!(text.as_deref(), Some("ab"));
        assert_eq!(usage.input_tokens, 4);
    }

    #[test]
    fn test_parse_gemini_without_candidates_is_none() {
        let (text, usage) = parse_completion(Provider::Gemini, "{}").unwrap();
        assert!(text.is_none());
        assert_eq!(usage, Usage::default());
    }

    #[test]
    fn test_error_message_extracts_nested_message() {
        let msg = error_message(r#"{"error":{"message":"invalid key","type":"auth"}}"#.to_string());
        assert_eq!(msg, "invalid key");
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message("gateway down".to_string()), "gateway down");
    }
}
