//! Error taxonomy for the service.
//!
//! Every failure maps to a stable `(code, message)` pair in the HTTP
//! response body. Validation failures carry the specific reason; upstream
//! and unexpected failures surface a generic message while the full
//! diagnostic context goes to the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Service-level error type.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A command or request failed validation. The message names the
    /// specific failure (missing field, unknown operation, out-of-range
    /// value) and is safe to return to the caller.
    #[error("{0}")]
    InvalidCommand(String),

    /// A required request property was absent or blank.
    #[error("required property '{0}' is missing")]
    MissingProperty(String),

    /// An update/delete target (or a direct lookup) matched no record.
    #[error("target not found")]
    TargetNotFound,

    /// A uniqueness constraint was violated (duplicate mail).
    #[error("data integrity violation")]
    DataIntegrityViolation,

    /// The call to the external model service failed. The internal
    /// classification (4xx/5xx/empty/transport) is logged where the
    /// failure is observed; callers only see this opaque variant.
    #[error("external call failed")]
    UpstreamCallFailed,

    /// Anything uncaught. The detail is logged, never returned.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidCommand(_) => "GEN_002",
            ApiError::MissingProperty(_) => "GEN_008",
            ApiError::TargetNotFound => "GEN_013",
            ApiError::DataIntegrityViolation => "GEN_009",
            ApiError::UpstreamCallFailed => "INT_202",
            ApiError::Unexpected(_) => "GEN_001",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCommand(_) | ApiError::MissingProperty(_) => StatusCode::BAD_REQUEST,
            ApiError::TargetNotFound => StatusCode::NOT_FOUND,
            ApiError::DataIntegrityViolation => StatusCode::CONFLICT,
            ApiError::UpstreamCallFailed => StatusCode::BAD_GATEWAY,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable message exposed to the caller. Never includes
    /// internal exception text for server-side failures.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::InvalidCommand(reason) => reason.clone(),
            ApiError::MissingProperty(name) => {
                format!("Required property '{}' is missing from the request.", name)
            }
            ApiError::TargetNotFound => "Requested resource was not found.".to_string(),
            ApiError::DataIntegrityViolation => {
                "The operation violates data integrity constraints.".to_string()
            }
            ApiError::UpstreamCallFailed => {
                "An error occurred while calling an external system.".to_string()
            }
            ApiError::Unexpected(_) => {
                "An unexpected internal server error occurred.".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Unexpected(detail) = &self {
            error!(detail = %detail, "unexpected internal error");
        }
        let body = json!({
            "code": self.code(),
            "message": self.public_message(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ApiError::InvalidCommand("x".into()).code(), "GEN_002");
        assert_eq!(ApiError::MissingProperty("prompt".into()).code(), "GEN_008");
        assert_eq!(ApiError::TargetNotFound.code(), "GEN_013");
        assert_eq!(ApiError::DataIntegrityViolation.code(), "GEN_009");
        assert_eq!(ApiError::UpstreamCallFailed.code(), "INT_202");
        assert_eq!(ApiError::Unexpected("boom".into()).code(), "GEN_001");
    }

    #[test]
    fn unexpected_detail_is_not_exposed() {
        let err = ApiError::Unexpected("connection pool exhausted".into());
        assert!(!err.public_message().contains("connection pool"));
    }

    #[test]
    fn invalid_command_reason_is_exposed() {
        let err = ApiError::InvalidCommand("missing required field 'name'".into());
        assert_eq!(err.public_message(), "missing required field 'name'");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
