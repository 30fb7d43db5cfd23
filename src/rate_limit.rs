//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to prevent brute force attacks.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::extract_client_ip;

/// Per-IP rate limiter for stricter endpoint-specific limiting.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const REGISTER_PER_MIN: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for password login (5 burst, 1 per second refill)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for registration (3 per minute)
    pub register: Arc<IpLimiter>,
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::with_limits(LOGIN_BURST, REGISTER_PER_MIN)
    }

    /// Login allows `login_burst` attempts refilled at one per second;
    /// registration allows `register_per_minute`.
    pub fn with_limits(login_burst: NonZeroU32, register_per_minute: NonZeroU32) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(LOGIN_PER_SEC).allow_burst(login_burst),
            )),
            register: Arc::new(RateLimiter::keyed(Quota::per_minute(register_per_minute))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware state: one limiter plus how to find the client IP.
#[derive(Clone)]
pub struct LimiterState {
    pub limiter: Arc<IpLimiter>,
    pub trust_proxy: bool,
}

async fn check(state: &LimiterState, request: Request, next: Next, message: &'static str) -> Response {
    let Some(ip) = extract_client_ip(&request, state.trust_proxy) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match state.limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            (StatusCode::TOO_MANY_REQUESTS, message).into_response()
        }
    }
}

/// Middleware for rate limiting password login.
pub async fn rate_limit_login(
    State(state): State<LimiterState>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &state,
        request,
        next,
        "Too many authentication attempts. Please wait before trying again.",
    )
    .await
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(state): State<LimiterState>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &state,
        request,
        next,
        "Too many signup attempts. Please wait before trying again.",
    )
    .await
}
