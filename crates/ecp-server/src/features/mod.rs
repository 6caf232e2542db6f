//! HTTP feature modules
//!
//! One module per API surface: `process` triggers the monthly pipeline,
//! `consumption` serves range aggregations, `runs` exposes the audit trail.

pub mod consumption;
pub mod process;
pub mod runs;

use axum::Router;

use crate::state::AppState;

/// All /api/v1 routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(process::routes())
        .merge(consumption::routes())
        .merge(runs::routes())
}
