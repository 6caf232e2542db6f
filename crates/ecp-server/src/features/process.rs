//! Trigger endpoint for the monthly processing pipeline
//!
//! POST /process/:year/:month runs the pipeline synchronously and returns
//! the structured outcome. A failed month comes back as 200 with
//! `success: false`; only an invalid period is an HTTP-level error.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::info;

use ecp_common::types::TargetPeriod;

use crate::error::AppError;
use crate::ingest::models::RunOutcome;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/process/:year/:month", post(process_month))
}

async fn process_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<RunOutcome>, AppError> {
    let period = TargetPeriod::with_min_year(year, month, state.min_year)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    info!(period = %period, "processing triggered via API");

    let outcome = state.pipeline.process(&period, &state.shutdown).await;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemConsumptionStore, MemRunStore};
    use crate::ingest::fetcher::{FileFetcher, RetryConfig};
    use crate::ingest::locator::SourceLocator;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use reqwest::{Client, Url};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(server_uri: &str) -> AppState {
        let retry = RetryConfig {
            max_attempts: 2,
            max_delay: Duration::from_millis(50),
            base_delay: Duration::from_millis(1),
        };
        let landing = Url::parse(&format!("{}/datasets/monthly", server_uri)).unwrap();
        let consumption: Arc<MemConsumptionStore> = Arc::new(MemConsumptionStore::new());
        let runs: Arc<MemRunStore> = Arc::new(MemRunStore::new());
        let pipeline = crate::ingest::MonthlyPipeline::new(
            SourceLocator::new(Client::new(), landing, retry.clone()),
            FileFetcher::new(Client::new(), retry),
            consumption.clone(),
            runs.clone(),
        );
        AppState {
            pipeline: Arc::new(pipeline),
            consumption,
            runs,
            db: None,
            shutdown: CancellationToken::new(),
            min_year: 2020,
        }
    }

    fn app(state: AppState) -> Router {
        Router::new().merge(routes()).with_state(state)
    }

    #[tokio::test]
    async fn test_process_returns_outcome_for_valid_period() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/datasets/monthly"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<a href="{}/f/2024-07.csv">x</a>"#,
                server.uri()
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/f/2024-07.csv"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Tinklas;Objekto tipas;h0\nESO;Butas;1,5\n"),
            )
            .mount(&server)
            .await;

        let response = app(test_state(&server.uri()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/process/2024/7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let outcome: RunOutcome = serde_json::from_slice(&bytes).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.period, "2024-07");
        assert_eq!(outcome.regions_aggregated, 1);
    }

    #[tokio::test]
    async fn test_invalid_month_is_bad_request() {
        let server = MockServer::start().await;
        let response = app(test_state(&server.uri()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/process/2024/13")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_year_below_floor_is_bad_request() {
        let server = MockServer::start().await;
        let response = app(test_state(&server.uri()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/process/2015/6")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_run_still_returns_ok_with_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/datasets/monthly"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let response = app(test_state(&server.uri()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/process/2024/7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let outcome: RunOutcome = serde_json::from_slice(&bytes).unwrap();
        assert!(!outcome.success);
        assert!(outcome.error_message.is_some());
    }
}
