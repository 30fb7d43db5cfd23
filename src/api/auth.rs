//! Authentication endpoints.
//!
//! - POST `/register` - Create a password account
//! - POST `/login` - Verify password, start a session and issue a token pair
//! - POST `/refresh` - Rotate the refresh token cookie, return a new access token
//! - POST `/logout` - Revoke the presented refresh token and session
//! - POST `/logout-all` - Revoke every refresh token and session of the caller

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use super::users::UserResponse;
use crate::accounts::{Accounts, Registration};
use crate::auth::{
    Auth, ClientMeta, CookiePolicy, OptionalAuth, REFRESH_COOKIE_NAME, SESSION_COOKIE_NAME,
    get_cookie,
};
use crate::credentials::TokenPair;
use crate::impl_has_auth_backend;
use crate::rate_limit::{LimiterState, RateLimitConfig, rate_limit_login, rate_limit_register};

#[derive(Clone)]
pub struct AuthState {
    pub accounts: Accounts,
    pub cookies: CookiePolicy,
    pub trust_proxy: bool,
    pub rate_limit: Option<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone());
    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone());

    let (login_router, register_router) = match &state.rate_limit {
        Some(limits) => (
            login_router.layer(middleware::from_fn_with_state(
                LimiterState {
                    limiter: limits.login.clone(),
                    trust_proxy: state.trust_proxy,
                },
                rate_limit_login,
            )),
            register_router.layer(middleware::from_fn_with_state(
                LimiterState {
                    limiter: limits.register.clone(),
                    trust_proxy: state.trust_proxy,
                },
                rate_limit_register,
            )),
        ),
        None => (login_router, register_router),
    };

    Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .with_state(state)
        .merge(login_router)
        .merge(register_router)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    name: Option<String>,
    confirm_password: Option<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    user: UserResponse,
}

async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let user = state
        .accounts
        .register(Registration {
            email: &payload.email,
            password: &payload.password,
            name: payload.name.as_deref(),
            confirm_password: payload.confirm_password.as_deref(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(&user),
        }),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    token_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserResponse>,
}

impl TokenResponse {
    fn new(pair: &TokenPair, user: Option<UserResponse>) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            expires_in: pair.access_expires_in,
            token_type: "Bearer",
            user,
        }
    }
}

async fn login(
    State(state): State<AuthState>,
    ClientMeta(meta): ClientMeta,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let outcome = state
        .accounts
        .login(&payload.email, &payload.password, &meta)
        .await?;

    let cookies = AppendHeaders([
        (
            SET_COOKIE,
            state.cookies.set_cookie(
                REFRESH_COOKIE_NAME,
                &outcome.tokens.refresh_token,
                outcome.tokens.refresh_expires_in,
            ),
        ),
        (
            SET_COOKIE,
            state.cookies.set_cookie(
                SESSION_COOKIE_NAME,
                &outcome.session_id,
                state.accounts.session_ttl_secs(),
            ),
        ),
    ]);

    Ok((
        StatusCode::OK,
        cookies,
        Json(TokenResponse::new(
            &outcome.tokens,
            Some(UserResponse::from(&outcome.user)),
        )),
    ))
}

/// Rotate the refresh token. Every failure clears the refresh cookie.
async fn refresh(
    State(state): State<AuthState>,
    ClientMeta(meta): ClientMeta,
    headers: HeaderMap,
) -> Response {
    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME);

    match state.accounts.refresh(presented, &meta).await {
        Ok(pair) => (
            StatusCode::OK,
            AppendHeaders([(
                SET_COOKIE,
                state.cookies.set_cookie(
                    REFRESH_COOKIE_NAME,
                    &pair.refresh_token,
                    pair.refresh_expires_in,
                ),
            )]),
            Json(TokenResponse::new(&pair, None)),
        )
            .into_response(),
        Err(e) => (
            AppendHeaders([(SET_COOKIE, state.cookies.clear_cookie(REFRESH_COOKIE_NAME))]),
            ApiError::from(e),
        )
            .into_response(),
    }
}

fn clear_auth_cookies(cookies: &CookiePolicy) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, cookies.clear_cookie(REFRESH_COOKIE_NAME)),
        (SET_COOKIE, cookies.clear_cookie(SESSION_COOKIE_NAME)),
    ])
}

#[derive(Serialize)]
struct LogoutResponse {
    revoked: bool,
}

async fn logout(
    State(state): State<AuthState>,
    OptionalAuth(caller): OptionalAuth,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state
        .accounts
        .logout(
            get_cookie(&headers, REFRESH_COOKIE_NAME),
            get_cookie(&headers, SESSION_COOKIE_NAME),
        )
        .await?;

    if let Some(user) = caller {
        info!(user_id = user.user_id, revoked, "User logged out");
    }

    Ok((
        StatusCode::OK,
        clear_auth_cookies(&state.cookies),
        Json(LogoutResponse { revoked }),
    ))
}

#[derive(Serialize)]
struct LogoutAllResponse {
    revoked_count: u64,
}

async fn logout_all(
    State(state): State<AuthState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let revoked_count = state.accounts.logout_all(user.user_id).await?;

    Ok((
        StatusCode::OK,
        clear_auth_cookies(&state.cookies),
        Json(LogoutAllResponse { revoked_count }),
    ))
}
