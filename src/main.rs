//! DreamVault Auth Server
//!
//! Issues and rotates session tokens for the DreamVault web and mobile
//! clients, and guards the user and admin APIs behind them.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dreamvault_server::auth::{HttpSocialProvider, PgRefreshStore, SystemClock};
use dreamvault_server::config::AppConfig;
use dreamvault_server::services::PgUserDirectory;
use dreamvault_server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("failed to run migrations")?;

    let state = AppState::new(
        &config.auth,
        Arc::new(SystemClock),
        Arc::new(PgRefreshStore::new(db_pool.clone())),
        Arc::new(PgUserDirectory::new(db_pool)),
        Arc::new(HttpSocialProvider::new(config.social_userinfo_url.clone())),
    );

    let app = app(state).layer(build_cors_layer(&config.cors_allowed_origins));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!(%addr, "Server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_origins = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    // Credentials are allowed so the refresh cookie reaches the API.
    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}
