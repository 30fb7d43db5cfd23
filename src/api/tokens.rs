//! Refresh token management API endpoints.
//!
//! - GET `/` - List active refresh tokens for current user
//! - DELETE `/{id}` - Revoke one of the current user's refresh tokens

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use serde::Serialize;

use super::error::ApiError;
use crate::accounts::Accounts;
use crate::auth::Auth;
use crate::db::RefreshTokenRecord;
use crate::impl_has_auth_backend;

#[derive(Clone)]
pub struct TokensState {
    pub accounts: Accounts,
    pub trust_proxy: bool,
}

impl_has_auth_backend!(TokensState);

pub fn router(state: TokensState) -> Router {
    Router::new()
        .route("/", get(list_tokens))
        .route("/{id}", delete(revoke_token))
        .with_state(state)
}

/// A ledger record as shown to its owner. Fingerprints stay server-side.
#[derive(Serialize)]
struct TokenInfo {
    id: i64,
    created_at: i64,
    expires_at: i64,
    ip: Option<String>,
    user_agent: Option<String>,
}

impl From<RefreshTokenRecord> for TokenInfo {
    fn from(record: RefreshTokenRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            expires_at: record.expires_at,
            ip: record.ip,
            user_agent: record.user_agent,
        }
    }
}

#[derive(Serialize)]
struct ListTokensResponse {
    tokens: Vec<TokenInfo>,
}

async fn list_tokens(
    State(state): State<TokensState>,
    Auth(user): Auth,
) -> Result<Json<ListTokensResponse>, ApiError> {
    let tokens = state
        .accounts
        .credentials()
        .active_tokens(user.user_id)
        .await?
        .into_iter()
        .map(TokenInfo::from)
        .collect();

    Ok(Json(ListTokensResponse { tokens }))
}

#[derive(Serialize)]
struct RevokeResponse {
    revoked: bool,
}

/// Revoke a token by record id. Ids owned by others revoke nothing.
async fn revoke_token(
    State(state): State<TokensState>,
    Auth(user): Auth,
    Path(id): Path<i64>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let revoked = state
        .accounts
        .credentials()
        .revoke_owned(user.user_id, id)
        .await?;

    Ok(Json(RevokeResponse { revoked }))
}
