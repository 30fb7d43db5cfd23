mod auth;
mod error;
mod tokens;
mod users;

use axum::Router;

use crate::accounts::Accounts;
use crate::auth::CookiePolicy;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    accounts: Accounts,
    cookies: CookiePolicy,
    trust_proxy: bool,
    rate_limit: Option<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        accounts: accounts.clone(),
        cookies,
        trust_proxy,
        rate_limit,
    };

    let users_state = users::UsersState {
        accounts: accounts.clone(),
        trust_proxy,
    };

    let tokens_state = tokens::TokensState {
        accounts,
        trust_proxy,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
        .nest("/tokens", tokens::router(tokens_state))
}
