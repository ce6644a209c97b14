//! Parley API server entry point.

use std::sync::Arc;

use parley_api::config::Config;
use parley_api::error::AppError;
use parley_api::state::AppState;
use parley_api::{routes, telemetry};
use parley_core::clock::SystemClock;
use parley_event_store::pg_event_store::PgEventStore;
use parley_event_store::pg_message_repository::PgMessageRepository;
use parley_messaging::application::dispatcher::InMemoryConnectionRegistry;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Parley API server");

    // Create database connection pool and bring the schema up to date.
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    // Build application state.
    let app_state = AppState::new(
        Arc::new(SystemClock),
        Arc::new(PgEventStore::new(pool.clone())),
        Arc::new(PgMessageRepository::new(pool)),
        Arc::new(InMemoryConnectionRegistry::new()),
    );

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = config.bind_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
