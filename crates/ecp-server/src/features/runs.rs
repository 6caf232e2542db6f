//! Read-only access to the processing audit trail

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::ingest::models::ProcessingRun;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/runs", get(list_runs))
        .route("/runs/:run_id", get(get_run))
}

#[derive(Debug, Deserialize)]
pub struct ListRunsParams {
    pub limit: Option<i64>,
}

/// List the most recent runs, newest first.
///
/// GET /runs?limit=20 (limit clamped to 1..=100)
async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<ListRunsParams>,
) -> Result<Json<Vec<ProcessingRun>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let runs = state.runs.recent(limit).await?;
    Ok(Json(runs))
}

/// GET /runs/:run_id
async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<ProcessingRun>, AppError> {
    state
        .runs
        .get(run_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("run {} not found", run_id)))
}
