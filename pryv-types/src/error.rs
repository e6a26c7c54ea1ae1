//! Error types reported by the Pryv API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An error body returned by the server: `{"error": {"id": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{id}: {message}")]
pub struct ApiError {
    /// Machine-readable error id, e.g. `unknown-resource`.
    pub id: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Additional error data (validation details, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiError {
    /// Extract an error from a response body, if it carries one.
    pub fn from_body(body: &Value) -> Option<Self> {
        body.get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_display() {
        let err = ApiError {
            id: "unknown-resource".into(),
            message: "Unknown event \"x\"".into(),
            data: None,
        };
        assert_eq!(err.to_string(), "unknown-resource: Unknown event \"x\"");
    }

    #[test]
    fn from_body_extracts_error() {
        let body = json!({"error": {"id": "invalid-parameters-format", "message": "bad", "data": [1]}});
        let err = ApiError::from_body(&body).unwrap();
        assert_eq!(err.id, "invalid-parameters-format");
        assert_eq!(err.data, Some(json!([1])));
    }

    #[test]
    fn from_body_without_error_is_none() {
        assert!(ApiError::from_body(&json!({"events": []})).is_none());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
