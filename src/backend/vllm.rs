use crate::error::BackendError;
use serde_json::Value;

pub(super) fn endpoint(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
}

/// `{"choices": [{"message": {"content": "..."}}]}`
///
/// A body without `choices` reads as empty content. A `choices` value that is
/// not a non-empty array, or content that is not a string, is malformed.
pub(super) fn extract_content(raw: &Value) -> Result<String, BackendError> {
    let Some(choices) = raw.get("choices") else {
        return Ok(String::new());
    };
    let first = choices
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or_else(|| BackendError::Decode(format!("expected a non-empty `choices` array, got {}", choices)))?;

    match first.get("message").and_then(|message| message.get("content")) {
        None => Ok(String::new()),
        Some(Value::String(content)) => Ok(content.clone()),
        Some(other) => Err(BackendError::Decode(format!(
            "expected string content in choices[0].message, got {}",
            other
        ))),
    }
}
