//! Current-user endpoints, one per authentication mode.
//!
//! - GET `/me` - Session or bearer
//! - GET `/me/session` - Session only
//! - GET `/me/token` - Bearer only, echoes the access token claims

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::accounts::Accounts;
use crate::auth::{Auth, AuthMethod, AuthenticatedUser, BearerAuth, SessionAuth};
use crate::db::User;
use crate::impl_has_auth_backend;
use crate::jwt::TokenType;

#[derive(Clone)]
pub struct UsersState {
    pub accounts: Accounts,
    pub trust_proxy: bool,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/me/session", get(me_session))
        .route("/me/token", get(me_token))
        .with_state(state)
}

/// Public view of a user. The UUID is the only id exposed.
#[derive(Serialize)]
pub(super) struct UserResponse {
    id: String,
    email: String,
    name: String,
    created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.uuid.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

#[derive(Serialize)]
struct ProfileResponse {
    id: String,
    email: String,
    name: String,
    auth_method: AuthMethod,
}

impl From<AuthenticatedUser> for ProfileResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            id: user.uuid,
            email: user.email,
            name: user.name,
            auth_method: user.method,
        }
    }
}

async fn me(Auth(user): Auth) -> Json<ProfileResponse> {
    Json(user.into())
}

async fn me_session(SessionAuth(user): SessionAuth) -> Json<ProfileResponse> {
    Json(user.into())
}

#[derive(Serialize)]
struct TokenClaimsResponse {
    sub: String,
    email: String,
    jti: Option<String>,
    typ: &'static str,
}

async fn me_token(BearerAuth(user): BearerAuth) -> Json<TokenClaimsResponse> {
    Json(TokenClaimsResponse {
        sub: user.uuid,
        email: user.email,
        jti: user.jti,
        typ: TokenType::Access.as_str(),
    })
}
