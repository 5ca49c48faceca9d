//! Food delivery core service
//!
//! Accepts commands over HTTP, appends the resulting events and keeps the
//! read models current with a background projector.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use food_delivery_core::api::{self, AppState};
use food_delivery_core::event_store::{AggregateRepository, PgEventStore};
use food_delivery_core::handlers::CommandService;
use food_delivery_core::jobs::{ProjectorJob, ProjectorJobConfig};
use food_delivery_core::projection::{PgReadModelStore, Projector};
use food_delivery_core::snapshot::PgSnapshotStore;
use food_delivery_core::{db, Config};

/// Initialize tracing/logging
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "food_delivery_core=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Build the application router
fn build_router(state: AppState) -> Router {
    // Layers run last-added first: logging -> context -> handler
    let api_routes = api::create_router()
        .layer(middleware::from_fn(api::middleware::context_middleware))
        .layer(middleware::from_fn(api::middleware::logging_middleware));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.json_logs());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = %config.environment, "Starting food delivery core");
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    db::verify_connection(&pool).await?;
    db::run_migrations(&pool).await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let events = Arc::new(PgEventStore::new(pool.clone()));
    let snapshots = Arc::new(PgSnapshotStore::new(pool.clone()));
    let read_models = Arc::new(PgReadModelStore::new(pool.clone()));

    let repository = AggregateRepository::new(events.clone(), snapshots)
        .with_snapshot_interval(config.snapshot_interval);
    let commands = CommandService::new(repository, config.command_max_attempts);

    let projector = Projector::new(events, read_models.clone())
        .with_batch_size(config.projector_batch_size)
        .with_gap_grace(config.projector_gap_grace);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let projector_handle = ProjectorJob::with_config(
        projector,
        ProjectorJobConfig {
            poll_interval: config.projector_poll_interval,
        },
    )
    .start(shutdown_rx);

    let app = build_router(AppState::new(commands, read_models));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");

    // Let the projector finish its current batch before the pool goes away
    let _ = shutdown_tx.send(true);
    if let Err(e) = projector_handle.await {
        tracing::error!(error = %e, "Projector job ended abnormally");
    }

    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
