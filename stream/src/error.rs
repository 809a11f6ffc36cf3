//! Error types.
//!
//! [`SessionError`] covers failures on a single connection and never leaves the
//! hub. [`HubError`] is the HTTP-facing error and renders as the uniform JSON
//! error envelope.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

/// Errors raised while writing to a single session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session has started or finished teardown.
    #[error("session is closed")]
    Closed,

    /// The write did not complete within the configured write wait.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// The underlying transport rejected the frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// The message could not be encoded as JSON.
    #[error("failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// Returns true if this error must tear the session down.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::WriteTimeout(_) | Self::Transport(_))
    }
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The request was not a valid WebSocket handshake.
    #[error("{0}")]
    Upgrade(String),

    /// The request body or parameters were invalid.
    #[error("{0}")]
    BadRequest(String),

    /// No route matches the request path.
    #[error("page not found")]
    NotFound,

    /// The route exists but not for this method.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// No identity was attached to the request.
    #[error("you need to provide a valid access token or user/pass")]
    Unauthenticated,

    /// The hub has been shut down.
    #[error("the stream hub is shutting down")]
    Closed,
}

impl HubError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Upgrade(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Closed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// The JSON error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Canonical reason phrase of the status code.
    pub error: String,
    /// Numeric status code.
    pub error_code: u16,
    /// Human readable description.
    pub error_description: String,
}

impl ErrorBody {
    /// Builds an envelope for the given status and description.
    #[must_use]
    pub fn new(status: StatusCode, description: impl Into<String>) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            error_code: status.as_u16(),
            error_description: description.into(),
        }
    }
}

impl From<ValidationErrors> for HubError {
    fn from(errors: ValidationErrors) -> Self {
        Self::BadRequest(validation_errors_to_text(&errors))
    }
}

/// Renders field errors as `Field 'x' is required` / `Field 'x' is not valid`,
/// sorted and joined with `; `.
fn validation_errors_to_text(errors: &ValidationErrors) -> String {
    let mut texts = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        let field = lowercase_first(&field);
        for error in field_errors {
            texts.push(match error.code.as_ref() {
                "required" => format!("Field '{field}' is required"),
                _ => format!("Field '{field}' is not valid"),
            });
        }
    }
    texts.sort();
    texts.join("; ")
}

fn lowercase_first(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody::new(status, self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_bad_request() {
        let body = ErrorBody::new(StatusCode::BAD_REQUEST, "you need todo something");
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "error": "Bad Request",
                "errorCode": 400,
                "errorDescription": "you need todo something"
            })
        );
    }

    #[test]
    fn test_error_body_internal() {
        let body = ErrorBody::new(StatusCode::INTERNAL_SERVER_ERROR, "something went wrong");
        assert_eq!(body.error, "Internal Server Error");
        assert_eq!(body.error_code, 500);
    }

    #[test]
    fn test_hub_error_status() {
        assert_eq!(
            HubError::Upgrade("bad".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(HubError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(HubError::Closed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_hub_error_into_response_status() {
        let response = HubError::BadRequest("missing field".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_hub_error_routing_statuses() {
        assert_eq!(HubError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            HubError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_validation_errors_to_text() {
        let mut errors = ValidationErrors::new();
        errors.add("priority", validator::ValidationError::new("range"));
        errors.add("message", validator::ValidationError::new("required"));

        let err = HubError::from(errors);

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Field 'message' is required; Field 'priority' is not valid"
        );
    }

    #[test]
    fn test_lowercase_first() {
        assert_eq!(lowercase_first("Message"), "message");
        assert_eq!(lowercase_first(""), "");
    }

    #[test]
    fn test_session_error_fatality() {
        assert!(SessionError::Transport("broken pipe".to_string()).is_fatal());
        assert!(SessionError::WriteTimeout(Duration::from_secs(1)).is_fatal());
        assert!(!SessionError::Closed.is_fatal());
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::Transport("broken pipe".to_string());
        assert_eq!(err.to_string(), "transport error: broken pipe");
    }
}
