//! services/api/src/bin/api.rs

use bookstore_api::{
    adapters::{DbAdapter, JwtTokenService},
    config::{Config, ConfigError},
    error::ApiError,
    web::{build_router, middleware::AUTH_HEADER, AppState, Repositories},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");
    if config.jwt_secret_is_default {
        warn!("JWT_SECRET is not set; signing tokens with the development secret");
    }

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = DbAdapter::new(db_pool, config.lock_timeout);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let tokens = Arc::new(JwtTokenService::new(&config.jwt_secret, config.jwt_issuer.clone()));
    let cors = cors_layer(&config)?;
    let bind_address = config.bind_address;
    let app_state = Arc::new(AppState::new(
        config,
        Repositories::from_adapter(db_adapter),
        tokens,
    ));

    // --- 4. Create the Web Router ---
    let app = build_router(app_state).layer(cors);

    // --- 5. Start the Server ---
    info!("Starting server on {}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Restricts cross-origin requests to `CORS_ORIGIN` when it is set.
fn cors_layer(config: &Config) -> Result<CorsLayer, ConfigError> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([HeaderName::from_static(AUTH_HEADER), CONTENT_TYPE, ACCEPT]);

    match &config.cors_origin {
        Some(origin) => {
            let origin = origin.parse::<HeaderValue>().map_err(|e| {
                ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
            })?;
            Ok(cors.allow_origin(origin))
        }
        None => Ok(cors.allow_origin(Any)),
    }
}
