//! Lenient JSON extraction for model replies.
//!
//! Models asked for JSON still return code fences or prose around it.
//! Accepted shapes, in order: raw JSON, fenced JSON, and JSON embedded in
//! surrounding text (the first `{...}` block that carries the expected key).

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Finds the first `{...}` block in `text` that parses as a JSON object
/// with `key` at its top level.
///
/// Text with no `"key":` occurrence is rejected by a regex up front.
/// Otherwise each `{` is tried left to right with a streaming parse that
/// stops at the balanced closing brace. A parsed object without the key is
/// skipped whole, so a nested object carrying the key is never returned.
pub fn extract_object_with_key<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!(r#""{}"\s*:"#, regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    re.find(text)?;

    let mut pos = 0;
    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        let rest = &text[start..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let end = stream.byte_offset();
                if value.get(key).is_some() {
                    return Some(&rest[..end]);
                }
                pos = start + end;
            }
            _ => pos = start + 1,
        }
    }
    None
}

/// Parses `text` as `T`, tolerating fences and surrounding prose.
/// Returns a human-readable reason on failure; never panics.
pub fn parse_json_lenient<T: DeserializeOwned>(text: &str, key: &str) -> Result<T, String> {
    let direct_err = match serde_json::from_str::<T>(strip_json_fences(text)) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let fragment = extract_object_with_key(text, key).ok_or_else(|| {
        format!("no JSON object containing \"{key}\" found ({direct_err})")
    })?;

    serde_json::from_str::<T>(fragment).map_err(|e| format!("embedded JSON did not match: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        options: Vec<u32>,
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_raw_json() {
        let parsed: Payload = parse_json_lenient(r#"{"options":[1,2]}"#, "options").unwrap();
        assert_eq!(parsed.options, vec![1, 2]);
    }

    #[test]
    fn test_parse_fenced_json_matches_raw() {
        let raw: Payload = parse_json_lenient(r#"{"options":[3]}"#, "options").unwrap();
        let fenced: Payload =
            parse_json_lenient("```json\n{\"options\":[3]}\n```", "options").unwrap();
        assert_eq!(raw, fenced);
    }

    #[test]
    fn test_parse_embedded_json_with_trailing_prose() {
        let text = "Sure! Here you go:\n{\"options\": [7, 8]}\nLet me know if {anything} else.";
        let parsed: Payload = parse_json_lenient(text, "options").unwrap();
        assert_eq!(parsed.options, vec![7, 8]);
    }

    #[test]
    fn test_extract_skips_objects_without_key() {
        let text = r#"note {"a": 1} then {"options": [1]}"#;
        assert_eq!(
            extract_object_with_key(text, "options"),
            Some(r#"{"options": [1]}"#)
        );
    }

    #[test]
    fn test_parse_embedded_json_with_nested_object_before_key() {
        let text = "Sure, here it is:\n{\"meta\": {\"n\": 2}, \"options\": [1, 2]}\nThanks!";
        let parsed: Payload = parse_json_lenient(text, "options").unwrap();
        assert_eq!(parsed.options, vec![1, 2]);
        assert_eq!(
            extract_object_with_key(text, "options"),
            Some(r#"{"meta": {"n": 2}, "options": [1, 2]}"#)
        );
    }

    #[test]
    fn test_nested_key_is_not_top_level() {
        let text = r#"see {"meta": {"options": [9]}} and {"options": [4]}"#;
        let parsed: Payload = parse_json_lenient(text, "options").unwrap();
        assert_eq!(parsed.options, vec![4]);
    }

    #[test]
    fn test_parse_malformed_is_err() {
        let result: Result<Payload, String> = parse_json_lenient("{\"options\": [1,", "options");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_missing_key_is_err() {
        let result: Result<Payload, String> = parse_json_lenient("no json here", "options");
        assert!(result.unwrap_err().contains("options"));
    }
}
