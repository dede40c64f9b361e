use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// One field-level validation failure, reported back to the client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message, details) = match self {
            ApiError::Validation(fields) => {
                warn!(?fields, "validation failed");
                (
                    StatusCode::BAD_REQUEST,
                    "ValidationError",
                    "validation failed".to_string(),
                    Some(fields),
                )
            }
            ApiError::NotFound(msg) => {
                warn!(%msg, "not found");
                (StatusCode::NOT_FOUND, "NotFoundError", msg, None)
            }
            ApiError::Conflict(msg) => {
                warn!(%msg, "conflict");
                (StatusCode::CONFLICT, "ConflictError", msg, None)
            }
            ApiError::StoreUnavailable(msg) => {
                error!(%msg, "store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "StoreUnavailableError",
                    msg,
                    None,
                )
            }
            ApiError::Internal(msg) => {
                error!(%msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "internal server error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: kind.to_string(),
            message,
            details,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_carries_field_details() {
        let err = ApiError::Validation(vec![FieldError::new("email", "Invalid email format")]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn statuses_match_error_kinds() {
        assert_eq!(
            ApiError::NotFound("User not found".into())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("Email already registered".into())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::StoreUnavailable("connection refused".into())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
