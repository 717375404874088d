//! Pre-flight checks run before a request may be sent.

use crate::types::PathParam;

pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON format";

/// One message per required path parameter that is still empty.
///
/// An empty result means the request is structurally sendable.
pub fn validate_path_params(params: &[PathParam]) -> Vec<String> {
    params
        .iter()
        .filter(|p| p.required && p.value.trim().is_empty())
        .map(|p| format!("{} is required", p.name))
        .collect()
}

/// Check that a request body is JSON. A blank body is valid since the body is optional.
pub fn validate_json_body(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(_) => None,
        Err(e) => {
            log::debug!("request body rejected: {}", e);
            Some(INVALID_JSON_MESSAGE.to_string())
        }
    }
}
