pub mod accounts;
pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod credentials;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use accounts::Accounts;
use api::create_api_router;
use auth::CookiePolicy;
use axum::Router;
use credentials::Credentials;
use db::Database;
use jwt::{JwtConfig, JwtSettings};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Token secrets, lifetimes, issuer and audience
    pub jwt: JwtSettings,
    /// Attributes for the refresh and session cookies
    pub cookies: CookiePolicy,
    /// Server-side session lifetime in seconds
    pub session_ttl_secs: u64,
    /// Take client IPs from X-Forwarded-For (requires running behind a proxy)
    pub trust_proxy: bool,
    /// Per-IP limits on login and registration; `None` disables them
    pub rate_limit: Option<RateLimitConfig>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt));
    let credentials = Credentials::new(config.db.clone(), jwt);
    let accounts = Accounts::new(config.db.clone(), credentials, config.session_ttl_secs);

    let api_router = create_api_router(
        accounts,
        config.cookies,
        config.trust_proxy,
        config.rate_limit.clone(),
    );

    Router::new().nest("/api", api_router)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    // Run cleanup tasks on startup
    init_cleanup(&config.db).await;

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    Ok((handle, local_addr))
}
