//! Error kinds shared across the registry, router, runner, and HTTP layers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Tagged error kinds for the ARIV gateway.
///
/// `ProbeDegraded` is intentionally absent: the hardware probe never raises,
/// it falls back to CPU-mode quietly (see the probe module).
#[derive(Debug, thiserror::Error)]
pub enum ArivError {
    #[error("invalid registry document: {0}")]
    ConfigInvalid(String),

    #[error("model not found in registry: {0}")]
    NotFound(String),

    #[error("model path not found: {path}")]
    ModelNotFound {
        path: String,
        /// True when the path was chosen by the caller (request body), which
        /// makes the failure client-visible; false for paths resolved
        /// internally by the router, which makes it a server-side fault.
        user_visible: bool,
    },

    #[error("runtime failed: binary={binary}, model={model_path}, exit_code={exit_code}, stderr={stderr_tail}")]
    RuntimeFailure {
        binary: String,
        model_path: String,
        exit_code: i32,
        stderr_tail: String,
    },

    #[error("dataset missing or empty: {0}")]
    DatasetMissing(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ArivError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ArivError::ConfigInvalid(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_invalid"),
            ArivError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ArivError::ModelNotFound { user_visible, .. } => {
                if *user_visible {
                    (StatusCode::BAD_REQUEST, "model_not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "model_not_found")
                }
            }
            ArivError::RuntimeFailure { .. } => (StatusCode::BAD_GATEWAY, "runtime_failure"),
            ArivError::DatasetMissing(_) => (StatusCode::BAD_REQUEST, "dataset_missing"),
            ArivError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ArivError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_failure_message_contains_contract_substrings() {
        let err = ArivError::RuntimeFailure {
            binary: "llama-cli".to_string(),
            model_path: "/models/x.gguf".to_string(),
            exit_code: 17,
            stderr_tail: "fatal error".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit_code=17"));
        assert!(msg.contains("fatal error"));
        assert!(msg.contains("binary=llama-cli"));
    }

    #[test]
    fn model_not_found_status_depends_on_visibility() {
        let client_err = ArivError::ModelNotFound {
            path: "a".to_string(),
            user_visible: true,
        };
        let server_err = ArivError::ModelNotFound {
            path: "a".to_string(),
            user_visible: false,
        };
        assert!(client_err.to_string().contains("a"));
        assert!(server_err.to_string().contains("a"));
    }
}
