use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokenward::cli::{
    ACCESS_SECRET_ENV, Args, REFRESH_SECRET_ENV, build_config, init_logging, load_secret,
    open_database,
};
use tokenward::{create_app, init_cleanup};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(access_secret) = load_secret(
        ACCESS_SECRET_ENV,
        args.access_secret_file.as_deref(),
        args.production,
    ) else {
        std::process::exit(1);
    };
    let Some(refresh_secret) = load_secret(
        REFRESH_SECRET_ENV,
        args.refresh_secret_file.as_deref(),
        args.production,
    ) else {
        std::process::exit(1);
    };

    let timeout = Duration::from_secs(args.db_timeout_secs.max(1));
    let Some(db) = open_database(&args.database, timeout).await else {
        std::process::exit(1);
    };

    let Some(config) = build_config(&args, db, access_secret, refresh_secret) else {
        std::process::exit(1);
    };

    init_cleanup(&config.db).await;

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let app = create_app(&config);

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, production = args.production, "Listening"),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
