//! Structured-response parsing for model output.

use crate::constants::codes;
use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````), if any
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse model output into `T`, tolerating a fenced wrapper and prose around a
/// single JSON object. Unparseable output is `E2301`.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T> {
    let body = strip_code_fence(content);
    if let Ok(value) = serde_json::from_str(body) {
        return Ok(value);
    }

    let object = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };
    serde_json::from_str(object).map_err(|e| {
        PipelineError::new(
            codes::MODEL_OUTPUT_MALFORMED,
            format!("Model output is not valid structured data: {e}"),
        )
        .with_details(serde_json::json!({ "preview": preview(content) }))
    })
}

fn preview(content: &str) -> String {
    content.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_strips_fenced_block() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(raw), "{\"a\": 1}");
        let value: Value = parse_structured(raw).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extracts_object_from_prose() {
        let value: Value = parse_structured("Here you go: {\"ok\": true} hope it helps").unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_malformed_output_is_model_output_error() {
        let err = parse_structured::<Value>("definitely not json").unwrap_err();
        assert_eq!(err.code, codes::MODEL_OUTPUT_MALFORMED);
    }
}
