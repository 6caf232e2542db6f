//! ECP Server Library
//!
//! HTTP server around the monthly electricity-consumption pipeline.
//!
//! # Overview
//!
//! - **Ingestion**: locate, download, parse and aggregate one month of
//!   consumption data from the open-data portal, replacing prior data for
//!   that month idempotently
//! - **API**: trigger processing, query aggregated consumption over a month
//!   range, inspect the run audit trail
//! - **Database**: PostgreSQL via SQLx
//!
//! # Example
//!
//! ```no_run
//! use ecp_server::{app, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = ecp_server::db::create_pool(&config.database).await?;
//!     let state = ecp_server::build_state(&config, pool)?;
//!     let router = app(state);
//!     // bind and serve router
//!     Ok(())
//! }
//! ```

use axum::{routing::get, Json, Router};
use reqwest::Url;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use config::Config;
use ingest::fetcher::FileFetcher;
use ingest::locator::SourceLocator;
use ingest::MonthlyPipeline;

/// Wire the pipeline and stores into shared application state.
pub fn build_state(config: &Config, pool: PgPool) -> anyhow::Result<AppState> {
    let client = reqwest::Client::builder()
        .timeout(config.ingest.http_timeout)
        .user_agent("ecp-server/0.1")
        .build()?;

    let landing_url = Url::parse(&config.ingest.dataset_url)
        .map_err(|e| anyhow::anyhow!("invalid dataset URL {}: {}", config.ingest.dataset_url, e))?;

    let db_pool = pool.clone();
    let consumption = Arc::new(db::PgConsumptionStore::new(pool.clone()));
    let runs = Arc::new(db::PgRunStore::new(pool));

    let pipeline = MonthlyPipeline::new(
        SourceLocator::new(client.clone(), landing_url, config.ingest.retry.clone()),
        FileFetcher::new(client, config.ingest.retry.clone()),
        consumption.clone(),
        runs.clone(),
    );

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        consumption,
        runs,
        db: Some(db_pool),
        shutdown: CancellationToken::new(),
        min_year: config.ingest.min_year,
    })
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", features::api_routes())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(state)
}

/// Liveness endpoint; probes the database when a pool is wired in.
async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    let database = match &state.db {
        Some(pool) => match db::health_check(pool).await {
            Ok(()) => "ok",
            Err(_) => "unreachable",
        },
        None => "not configured",
    };

    Json(json!({
        "status": "ok",
        "service": "ecp-server",
        "database": database,
    }))
}
