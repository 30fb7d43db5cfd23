//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::credentials::CredentialError;

/// Internal auth error kind used by the core authentication logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    ExpiredToken,
    UserNotFound,
    StoreUnavailable,
    DatabaseError,
}

impl AuthErrorKind {
    /// Store failures are reported as-is instead of falling through to
    /// the next authentication method.
    pub(super) fn is_store(&self) -> bool {
        matches!(self, Self::StoreUnavailable | Self::DatabaseError)
    }
}

impl From<&CredentialError> for AuthErrorKind {
    fn from(e: &CredentialError) -> Self {
        match e {
            CredentialError::ExpiredToken => Self::ExpiredToken,
            CredentialError::MalformedToken
            | CredentialError::ReuseDetected
            | CredentialError::InactiveToken => Self::InvalidToken,
            CredentialError::UserNotFound => Self::UserNotFound,
            CredentialError::NotAuthenticated | CredentialError::InvalidCredentials => {
                Self::NotAuthenticated
            }
            e if e.is_transient() => Self::StoreUnavailable,
            _ => Self::DatabaseError,
        }
    }
}

/// API authentication errors, returned as JSON.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::ExpiredToken
            | AuthErrorKind::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InvalidToken => "Invalid token",
            AuthErrorKind::ExpiredToken => "Token expired",
            AuthErrorKind::UserNotFound => "User not found",
            AuthErrorKind::StoreUnavailable => "Service temporarily unavailable",
            AuthErrorKind::DatabaseError => "Database error",
        }
    }

    fn reason(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "not_authenticated",
            AuthErrorKind::InvalidToken => "malformed_token",
            AuthErrorKind::ExpiredToken => "expired_token",
            AuthErrorKind::UserNotFound => "user_not_found",
            AuthErrorKind::StoreUnavailable => "store_unavailable",
            AuthErrorKind::DatabaseError => "internal",
        }
    }
}

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            reason: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
                reason: self.reason(),
            }),
        )
            .into_response()
    }
}
