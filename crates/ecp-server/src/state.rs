//! Application state shared across HTTP handlers

use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::db::{ConsumptionStore, RunStore};
use crate::ingest::MonthlyPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MonthlyPipeline>,
    pub consumption: Arc<dyn ConsumptionStore>,
    pub runs: Arc<dyn RunStore>,
    /// Backing pool for the health probe; absent in store-stubbed tests.
    pub db: Option<PgPool>,
    /// Cancels in-flight pipeline runs on shutdown.
    pub shutdown: CancellationToken,
    /// Lower bound for accepted processing years.
    pub min_year: i32,
}
