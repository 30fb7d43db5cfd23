//! Shared error handling for API endpoints.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::credentials::CredentialError;

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// A credential lifecycle failure, carrying its stable reason code.
    Credential(CredentialError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

fn credential_response(e: CredentialError) -> (StatusCode, String, &'static str) {
    let reason = e.reason();
    let (status, message) = match &e {
        CredentialError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        CredentialError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        CredentialError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        e if e.is_unauthorized() => (StatusCode::UNAUTHORIZED, e.to_string()),
        e if e.is_transient() => {
            error!(error = %e, "Store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable".to_string(),
            )
        }
        e => {
            error!(error = %e, "Request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    (status, message, reason)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, reason) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Credential(e) => {
                let (status, msg, reason) = credential_response(e);
                (status, msg, Some(reason))
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: message,
                reason,
            }),
        )
            .into_response()
    }
}
