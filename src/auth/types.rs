//! Authentication user types.

use serde::Serialize;

/// How the caller proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Session,
    Bearer,
}

/// The identity a request is trusted to act as.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Database user ID
    pub user_id: i64,
    pub uuid: String,
    pub email: String,
    pub name: String,
    /// Access token id, only set for bearer authentication
    pub jti: Option<String>,
    pub method: AuthMethod,
}
