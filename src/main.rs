// src/main.rs
use axum::{http::HeaderValue, Router};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use authkit::auth::{auth_routes, AuthService};
use authkit::common::{migrations, AppState};
use authkit::config::AuthConfig;
use authkit::repository::SqliteRepository;
use authkit::services::email::delivery_from_config;
use authkit::services::providers::http_client;
use authkit::services::{ProviderRegistry, RateLimitService};

/// How often idle rate-limit windows are dropped
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Error tracking is optional; the guard must live as long as the server
    let _sentry = env::var("SENTRY_DSN")
        .ok()
        .filter(|dsn| !dsn.is_empty())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    environment: Some(
                        env::var("ENVIRONMENT")
                            .unwrap_or_else(|_| "development".to_string())
                            .into(),
                    ),
                    ..Default::default()
                },
            ))
        });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer())
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = AuthConfig::from_env()?;
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://authkit.db".to_string());

    info!(
        base_url = %config.base_url,
        strategies = ?config.strategies.enabled_names(),
        "Loaded auth configuration"
    );

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http = http_client();
    let providers = ProviderRegistry::from_config(&config.strategies, &config.base_url, http.clone());
    info!(providers = ?providers.names(), "OAuth providers registered");

    let delivery = match &config.email {
        Some(email) => delivery_from_config(email, http),
        None => None,
    };
    if delivery.is_none() {
        warn!("No email delivery configured; verification, reset and magic-link mails are disabled");
    }

    let rate_limit_service = Arc::new(RateLimitService::new(
        config.security.rate_limiting.clone(),
    ));

    let mut auth = AuthService::new(config, Arc::new(SqliteRepository::new(pool)))?
        .with_providers(providers);
    if let Some(delivery) = delivery {
        auth = auth.with_delivery(delivery);
    }

    {
        let limiter = rate_limit_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup_expired().await;
            }
        });
    }

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let shared = Arc::new(AppState::new(Arc::new(auth), rate_limit_service));

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = Router::new()
        .merge(auth_routes(shared))
        .layer({
            let cors_origins = env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

            let origins: Vec<HeaderValue> = cors_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_credentials(true)
        })
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
