//! Coursehub — real-time course selection server.
//!
//! Main entry point that wires all crates together and starts the
//! server. Every bootstrap step logs its name; any failure aborts the
//! process with a non-zero exit.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::{EnvFilter, fmt};

use coursehub_api::oidc::OidcClient;
use coursehub_api::state::AppState;
use coursehub_core::config::AppConfig;
use coursehub_core::error::AppError;
use coursehub_database::repositories::SessionRepository;
use coursehub_realtime::RealtimeEngine;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("COURSEHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).with_target(true).init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Main server run function.
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Connecting to database");
    let db = coursehub_database::DatabasePool::connect(&config.database).await?;

    tracing::info!("Running database migrations");
    coursehub_database::migration::run_migrations(db.pool()).await?;

    let sessions = SessionRepository::new(db.pool().clone());
    match sessions.delete_expired(now_seconds()).await {
        Ok(swept) if swept > 0 => tracing::info!(swept, "expired browser sessions removed"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "expired-session sweep failed"),
    }

    tracing::info!("Building realtime engine");
    let engine = Arc::new(RealtimeEngine::new(config.perf.clone(), db.pool().clone()).await?);

    tracing::info!("Fetching OIDC signing keys");
    let redirect_uri = format!("{}/auth", config.server.base_url.trim_end_matches('/'));
    let oidc = Arc::new(OidcClient::discover(config.auth.clone(), redirect_uri).await?);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        config: Arc::new(config),
        sessions,
        engine,
        oidc,
    };
    let router = coursehub_api::build_router(state);

    tracing::info!(addr = %addr, "Binding listener");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind listener on {addr}: {e}")))?;

    tracing::info!("Serving HTTP");
    axum::serve(listener, router)
        .await
        .map_err(|e| AppError::internal(format!("Server failed: {e}")))?;

    Ok(())
}

/// Current Unix timestamp in seconds.
fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
