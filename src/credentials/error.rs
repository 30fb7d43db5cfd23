//! Credential lifecycle error taxonomy.

use crate::jwt::JwtError;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("malformed token")]
    MalformedToken,

    #[error("token expired")]
    ExpiredToken,

    #[error("refresh token reuse detected, all sessions revoked")]
    ReuseDetected,

    #[error("refresh token is not active")]
    InactiveToken,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl CredentialError {
    /// Stable machine-readable code for clients.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::ExpiredToken => "expired_token",
            Self::ReuseDetected => "reuse_detected",
            Self::InactiveToken => "inactive_token",
            Self::NotAuthenticated => "not_authenticated",
            Self::InvalidCredentials => "invalid_credentials",
            Self::UserNotFound => "user_not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Internal(_) => "internal",
            Self::Store(e) if is_transient(e) => "store_unavailable",
            Self::Store(_) => "internal",
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if is_transient(e))
    }

    /// Whether the failure means the presented credential must be discarded.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken
                | Self::ExpiredToken
                | Self::ReuseDetected
                | Self::InactiveToken
                | Self::NotAuthenticated
                | Self::InvalidCredentials
                | Self::UserNotFound
        )
    }
}

/// Connectivity failures, as opposed to query or constraint errors.
fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        // SQLITE_BUSY / SQLITE_LOCKED
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("5") | Some("6")),
        _ => false,
    }
}

impl From<JwtError> for CredentialError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => Self::ExpiredToken,
            JwtError::Malformed(_) | JwtError::WrongTokenType => Self::MalformedToken,
            JwtError::Encoding(_) | JwtError::TimeError => Self::Internal(e.to_string()),
        }
    }
}
