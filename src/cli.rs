//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::CookiePolicy;
use crate::db::Database;
use crate::jwt::JwtSettings;
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};

const MIN_SECRET_LENGTH: usize = 32;
const MIN_PRODUCTION_SECRET_LENGTH: usize = 64;

pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokenward",
    about = "Session and rotating token pair authentication service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7292", env = "PORT")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "tokenward.db", env = "DATABASE_PATH")]
    pub database: String,

    /// Issuer claim written into and required from every token
    #[arg(long, default_value = "tokenward", env = "TOKEN_ISSUER")]
    pub issuer: String,

    /// Audience claim written into and required from every token
    #[arg(long, default_value = "tokenward-clients", env = "TOKEN_AUDIENCE")]
    pub audience: String,

    /// Access token lifetime, e.g. "15m"
    #[arg(long, default_value = "15m", value_parser = parse_duration, env = "ACCESS_TOKEN_TTL")]
    pub access_token_ttl: Duration,

    /// Refresh token lifetime, e.g. "7d"
    #[arg(long, default_value = "7d", value_parser = parse_duration, env = "REFRESH_TOKEN_TTL")]
    pub refresh_token_ttl: Duration,

    /// Server-side session lifetime, e.g. "1d"
    #[arg(long, default_value = "1d", value_parser = parse_duration, env = "SESSION_TTL")]
    pub session_ttl: Duration,

    /// Production mode: Secure + SameSite=Strict cookies and longer secrets
    #[arg(long, env = "PRODUCTION")]
    pub production: bool,

    /// Take client IPs from X-Forwarded-For. Only enable behind a trusted proxy
    #[arg(long, env = "TRUST_PROXY")]
    pub trust_proxy: bool,

    /// Seconds to wait for a database connection or lock before failing
    #[arg(long, default_value = "5")]
    pub db_timeout_secs: u64,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Parse `<n>s`, `<n>m`, `<n>h` or `<n>d`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid duration: {}", s))?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(format!("Unknown duration unit in {}: use s, m, h or d", s)),
    };

    let secs = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Duration too large: {}", s))?;
    if secs == 0 {
        return Err("Duration must be greater than zero".to_string());
    }
    Ok(Duration::from_secs(secs))
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>, production: bool) -> Option<Vec<u8>> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            env_var,
            "Token secret is required. Set the environment variable (recommended) or pass a secret file"
        );
        return None;
    };

    let min_len = if production {
        MIN_PRODUCTION_SECRET_LENGTH
    } else {
        MIN_SECRET_LENGTH
    };
    if secret.len() < min_len {
        error!(
            env_var,
            "Token secret is shorter than {} characters. Use a longer secret", min_len
        );
        return None;
    }

    Some(secret.into_bytes())
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
) -> Option<ServerConfig> {
    if access_secret == refresh_secret {
        error!("Access and refresh token secrets must differ");
        return None;
    }
    if args.access_token_ttl >= args.refresh_token_ttl {
        warn!("Access token lifetime is not shorter than refresh token lifetime");
    }

    Some(ServerConfig {
        db,
        jwt: JwtSettings {
            access_secret,
            refresh_secret,
            issuer: args.issuer.clone(),
            audience: args.audience.clone(),
            access_ttl: args.access_token_ttl,
            refresh_ttl: args.refresh_token_ttl,
        },
        cookies: CookiePolicy::new(args.production),
        session_ttl_secs: args.session_ttl.as_secs(),
        trust_proxy: args.trust_proxy,
        rate_limit: Some(RateLimitConfig::new()),
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str, timeout: Duration) -> Option<Database> {
    match Database::open_with_timeout(path, timeout).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
