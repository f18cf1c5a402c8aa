use crate::error::BackendError;
use serde_json::Value;

pub(super) fn endpoint(base_url: &str) -> String {
    format!("{}/api/chat", base_url.trim_end_matches('/'))
}

/// `{"message": {"content": "..."}}`; a missing message reads as empty content.
pub(super) fn extract_content(raw: &Value) -> Result<String, BackendError> {
    match raw.get("message").and_then(|message| message.get("content")) {
        None => Ok(String::new()),
        Some(Value::String(content)) => Ok(content.clone()),
        Some(other) => Err(BackendError::Decode(format!(
            "expected string content in message, got {}",
            other
        ))),
    }
}
