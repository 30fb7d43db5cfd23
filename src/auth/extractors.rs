//! Axum extractors for authentication.
//!
//! A request proves its identity through one of two methods: a server-side
//! session cookie or a bearer access token. Each extractor fixes which
//! methods it accepts.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::error;

use super::cookie::{SESSION_COOKIE_NAME, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::ip::extract_client_ip;
use super::state::HasAuthBackend;
use super::types::{AuthMethod, AuthenticatedUser};
use crate::credentials::{CredentialError, RequestMeta};

const BEARER_SCHEME: &str = "Bearer";

/// The raw bearer token from the Authorization header, if any.
/// The scheme name is case-insensitive.
fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case(BEARER_SCHEME)
        .then(|| token.trim())
}

fn store_error(context: &str, e: CredentialError) -> AuthErrorKind {
    error!(error = %e, "{}", context);
    AuthErrorKind::from(&e)
}

/// Resolve the session cookie to a user. The user is reloaded on every call.
async fn authenticate_session<S>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let session_id =
        get_cookie(&parts.headers, SESSION_COOKIE_NAME).ok_or(AuthErrorKind::NotAuthenticated)?;

    let user = state
        .accounts()
        .session_user(session_id)
        .await
        .map_err(|e| store_error("Failed to look up session", e))?
        .ok_or(AuthErrorKind::NotAuthenticated)?;

    Ok(AuthenticatedUser {
        user_id: user.id,
        uuid: user.uuid,
        email: user.email,
        name: user.name,
        jti: None,
        method: AuthMethod::Session,
    })
}

/// Verify a bearer access token and check its subject still exists.
async fn authenticate_bearer<S>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let token = bearer_token(&parts.headers).ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = state
        .jwt()
        .verify_access(token)
        .map_err(|e| AuthErrorKind::from(&CredentialError::from(e)))?;

    let user = state
        .db()
        .users()
        .get_by_uuid(&claims.sub)
        .await
        .map_err(|e| store_error("Failed to get user", e.into()))?
        .ok_or(AuthErrorKind::UserNotFound)?;

    Ok(AuthenticatedUser {
        user_id: user.id,
        uuid: user.uuid,
        email: user.email,
        name: user.name,
        jti: Some(claims.jti),
        method: AuthMethod::Bearer,
    })
}

/// Session first, then bearer. When both fail, a presented bearer token's
/// error wins over the generic `NotAuthenticated`.
async fn authenticate_combined<S>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    match authenticate_session(parts, state).await {
        Ok(user) => return Ok(user),
        Err(kind) if kind.is_store() => return Err(kind),
        Err(_) => {}
    }

    if bearer_token(&parts.headers).is_some() {
        authenticate_bearer(parts, state).await
    } else {
        Err(AuthErrorKind::NotAuthenticated)
    }
}

/// Extractor for endpoints that only accept a server-side session.
pub struct SessionAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for SessionAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_session(parts, state)
            .await
            .map(SessionAuth)
            .map_err(ApiAuthError::from)
    }
}

/// Extractor for endpoints that only accept a bearer access token.
pub struct BearerAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_bearer(parts, state)
            .await
            .map(BearerAuth)
            .map_err(ApiAuthError::from)
    }
}

/// Extractor accepting either method, session first.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_combined(parts, state)
            .await
            .map(Auth)
            .map_err(ApiAuthError::from)
    }
}

/// Optional authentication extractor - never fails, returns Option<AuthenticatedUser>.
/// Useful for endpoints that work both authenticated and unauthenticated.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(authenticate_combined(parts, state).await.ok()))
    }
}

/// Client IP and user agent for the refresh token ledger.
pub struct ClientMeta(pub RequestMeta);

impl<S> FromRequestParts<S> for ClientMeta
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ip = extract_client_ip(parts, state.trust_proxy());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(ClientMeta(RequestMeta::new(ip, user_agent)))
    }
}
