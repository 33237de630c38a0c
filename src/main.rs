mod config;
mod error;
mod models;
mod routes;
mod services;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::catalog::{start_refresh_task, CatalogService};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<CatalogService>,
    pub start_time: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "m3u_catalog=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting M3U Catalog v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.node_env);

    if config.playlist_sources.is_empty() {
        tracing::warn!("PLAYLIST_SOURCES is empty, catalog will have no channels");
    }

    let catalog = Arc::new(CatalogService::from_config(&config)?);
    tracing::info!(
        "Catalog service initialized ({} sources, remap file {})",
        catalog.source_count(),
        config.remap_file
    );

    // Start refresh task (runs in background)
    tokio::spawn(start_refresh_task(catalog.clone(), config.refresh_interval_secs));

    // Build application state
    let state = Arc::new(AppState {
        config,
        catalog,
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live))
        // Catalog endpoints
        .route("/api/catalog", get(routes::catalog::get_catalog))
        .route("/api/catalog/refresh", post(routes::catalog::refresh_catalog))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
