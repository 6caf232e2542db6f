//! Monthly processing pipeline
//!
//! Drives locate, download, parse, aggregate and persist for one target
//! month, tracking progress in a `processing_runs` audit record. The status
//! is persisted before each phase starts so concurrent readers observe live
//! progress, and any error from any phase is converted exactly once, here,
//! into a `Failed` record plus a structured outcome. Callers never need to
//! catch an error to learn that a month failed.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ecp_common::types::TargetPeriod;

use crate::db::{ConsumptionStore, RunStore};

use super::aggregate::aggregate_by_region;
use super::error::IngestError;
use super::fetcher::FileFetcher;
use super::locator::SourceLocator;
use super::models::{ProcessingRun, RunOutcome, RunStatus};
use super::parser::ConsumptionCsvReader;

/// One pipeline instance; safe to share and to run for different months
/// concurrently. Two concurrent runs for the *same* month would race on the
/// supersession step, so single-flight per month is the caller's job.
pub struct MonthlyPipeline {
    locator: SourceLocator,
    fetcher: FileFetcher,
    consumption: Arc<dyn ConsumptionStore>,
    runs: Arc<dyn RunStore>,
}

impl MonthlyPipeline {
    pub fn new(
        locator: SourceLocator,
        fetcher: FileFetcher,
        consumption: Arc<dyn ConsumptionStore>,
        runs: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            locator,
            fetcher,
            consumption,
            runs,
        }
    }

    /// Process one month end to end. Always returns an outcome, never an
    /// error.
    pub async fn process(&self, period: &TargetPeriod, cancel: &CancellationToken) -> RunOutcome {
        let started = Instant::now();
        let mut run = ProcessingRun::begin(period);

        info!(run_id = %run.id, period = %period, "starting monthly processing run");

        if let Err(e) = self.runs.create(&run).await {
            // Nothing to audit against; fail the run without a record.
            error!(period = %period, error = %e, "could not create run record");
            return self.outcome(&run, period, 0, Some(e.to_string()), started);
        }

        match self.run_phases(&mut run, period, cancel).await {
            Ok(regions) => {
                info!(
                    run_id = %run.id,
                    period = %period,
                    records_processed = run.records_processed,
                    regions,
                    duration_secs = started.elapsed().as_secs_f64(),
                    "monthly processing run completed"
                );
                self.outcome(&run, period, regions, None, started)
            }
            Err(e) if is_cancellation(&e) => {
                // An aborted run keeps whatever status it last reached;
                // readers treat non-terminal statuses as indeterminate.
                warn!(run_id = %run.id, period = %period, "processing run cancelled");
                self.outcome(&run, period, 0, Some("processing cancelled".to_string()), started)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(run_id = %run.id, period = %period, error = %message, "processing run failed");

                run.status = RunStatus::Failed;
                run.error_message = Some(message.clone());
                run.completed_at = Some(Utc::now());
                if let Err(update_err) = self.runs.update(&run).await {
                    error!(run_id = %run.id, error = %update_err, "could not record run failure");
                }

                self.outcome(&run, period, 0, Some(message), started)
            }
        }
    }

    async fn run_phases(
        &self,
        run: &mut ProcessingRun,
        period: &TargetPeriod,
        cancel: &CancellationToken,
    ) -> anyhow::Result<i64> {
        self.advance(run, RunStatus::Downloading).await?;
        let url = self.locator.resolve(&period.file_name(), cancel).await?;
        let buffer = self.fetcher.download(&url, cancel).await?;

        self.advance(run, RunStatus::Parsing).await?;
        let reader = ConsumptionCsvReader::new(buffer)?;
        let summary = reader.parse_all(cancel)?;

        self.advance(run, RunStatus::Aggregating).await?;
        let (aggregates, stats) = aggregate_by_region(&summary.records, period);
        run.records_processed = summary.records.len() as i64;
        // Records remaining after the apartment-category filter.
        run.records_filtered = stats.records_matched as i64;

        let month = period.month_start();
        let existing = self.consumption.count_for_month(month).await?;
        if existing > 0 {
            info!(
                run_id = %run.id,
                period = %period,
                superseded = existing,
                "replacing previously persisted month"
            );
        }

        self.advance(run, RunStatus::Saving).await?;
        self.consumption.replace_month(month, &aggregates).await?;

        run.completed_at = Some(Utc::now());
        self.advance(run, RunStatus::Completed).await?;

        Ok(aggregates.len() as i64)
    }

    /// Move the run to `next` and persist before the phase's work begins.
    async fn advance(&self, run: &mut ProcessingRun, next: RunStatus) -> anyhow::Result<()> {
        debug_assert!(run.status.can_transition_to(next));
        run.status = next;
        self.runs.update(run).await
    }

    fn outcome(
        &self,
        run: &ProcessingRun,
        period: &TargetPeriod,
        regions: i64,
        error_message: Option<String>,
        started: Instant,
    ) -> RunOutcome {
        RunOutcome {
            success: error_message.is_none(),
            period: period.label(),
            records_processed: run.records_processed,
            records_filtered: run.records_filtered,
            regions_aggregated: regions,
            error_message,
            duration_secs: started.elapsed().as_secs_f64(),
        }
    }
}

fn is_cancellation(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<IngestError>(), Some(IngestError::Cancelled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemConsumptionStore, MemRunStore};
    use crate::ingest::fetcher::RetryConfig;
    use reqwest::{Client, Url};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CSV_BODY: &str = "Tinklas;Objekto tipas;00:00-01:00;01:00-02:00\n\
                            ESO;Butas;1,5;2,0\n\
                            ESO;Butas;1,0;1,5\n\
                            ESO;Namas;9,0;9,0\n\
                            Regionas2;Butas;0,5;1,0\n";

    fn landing_html(server_uri: &str) -> String {
        format!(
            r#"<html><body>
                <a href="{}/files/1a2b3c/2024-07.csv">July 2024</a>
            </body></html>"#,
            server_uri
        )
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            max_delay: Duration::from_millis(50),
            base_delay: Duration::from_millis(1),
        }
    }

    struct Harness {
        pipeline: MonthlyPipeline,
        consumption: Arc<MemConsumptionStore>,
        runs: Arc<MemRunStore>,
    }

    fn harness(server_uri: &str) -> Harness {
        let consumption = Arc::new(MemConsumptionStore::new());
        let runs = Arc::new(MemRunStore::new());
        let landing = Url::parse(&format!("{}/datasets/monthly", server_uri)).unwrap();
        let pipeline = MonthlyPipeline::new(
            SourceLocator::new(Client::new(), landing, fast_retry()),
            FileFetcher::new(Client::new(), fast_retry()),
            consumption.clone(),
            runs.clone(),
        );
        Harness {
            pipeline,
            consumption,
            runs,
        }
    }

    async fn mount_landing(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/datasets/monthly"))
            .respond_with(ResponseTemplate::new(200).set_body_string(landing_html(&server.uri())))
            .mount(server)
            .await;
    }

    async fn mount_csv(server: &MockServer, body: &str) {
        Mock::given(method("GET"))
            .and(path("/files/1a2b3c/2024-07.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn july() -> TargetPeriod {
        TargetPeriod::new(2024, 7).unwrap()
    }

    #[tokio::test]
    async fn test_successful_run() {
        let server = MockServer::start().await;
        mount_landing(&server).await;
        mount_csv(&server, CSV_BODY).await;

        let h = harness(&server.uri());
        let outcome = h.pipeline.process(&july(), &CancellationToken::new()).await;

        assert!(outcome.success);
        assert_eq!(outcome.period, "2024-07");
        assert_eq!(outcome.records_processed, 4);
        assert_eq!(outcome.records_filtered, 3);
        assert_eq!(outcome.regions_aggregated, 2);
        assert!(outcome.error_message.is_none());

        let rows = h.consumption.rows();
        assert_eq!(rows.len(), 2);
        let eso = rows.iter().find(|r| r.region == "ESO").unwrap();
        assert_eq!(eso.total_consumption, dec!(6.0));
        assert_eq!(eso.record_count, 2);
        assert_eq!(eso.source_file, "2024-07.csv");

        let run = &h.runs.runs()[0];
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.completed_at.is_some());
        assert!(run.error_message.is_none());
    }

    #[tokio::test]
    async fn test_statuses_persisted_in_order() {
        let server = MockServer::start().await;
        mount_landing(&server).await;
        mount_csv(&server, CSV_BODY).await;

        let h = harness(&server.uri());
        h.pipeline.process(&july(), &CancellationToken::new()).await;

        assert_eq!(
            h.runs.status_history(),
            vec![
                RunStatus::Started,
                RunStatus::Downloading,
                RunStatus::Parsing,
                RunStatus::Aggregating,
                RunStatus::Saving,
                RunStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_rerun_supersedes_previous_month_data() {
        let server = MockServer::start().await;
        mount_landing(&server).await;
        mount_csv(&server, CSV_BODY).await;

        let h = harness(&server.uri());
        let first = h.pipeline.process(&july(), &CancellationToken::new()).await;
        let second = h.pipeline.process(&july(), &CancellationToken::new()).await;

        assert!(first.success);
        assert!(second.success);

        // Exactly one live row set for the month; no duplicates.
        let rows = h.consumption.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.iter().filter(|r| r.region == "ESO").count(), 1);
        assert_eq!(h.runs.runs().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_link_fails_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/datasets/monthly"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body></body></html>"),
            )
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        let outcome = h.pipeline.process(&july(), &CancellationToken::new()).await;

        assert!(!outcome.success);
        let message = outcome.error_message.unwrap();
        assert!(message.contains("2024-07.csv"), "message: {}", message);

        let run = &h.runs.runs()[0];
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.completed_at.is_some());
        assert!(h.consumption.rows().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_download_status_fails_run_without_retries() {
        let server = MockServer::start().await;
        mount_landing(&server).await;
        Mock::given(method("GET"))
            .and(path("/files/1a2b3c/2024-07.csv"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        let outcome = h.pipeline.process(&july(), &CancellationToken::new()).await;

        assert!(!outcome.success);
        assert!(outcome.error_message.is_some());
        assert_eq!(h.runs.runs()[0].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_short_header_fails_during_parsing() {
        let server = MockServer::start().await;
        mount_landing(&server).await;
        mount_csv(&server, "Tinklas;Objekto tipas\n").await;

        let h = harness(&server.uri());
        let outcome = h.pipeline.process(&july(), &CancellationToken::new()).await;

        assert!(!outcome.success);
        assert_eq!(
            h.runs.status_history(),
            vec![
                RunStatus::Started,
                RunStatus::Downloading,
                RunStatus::Parsing,
                RunStatus::Failed,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_month_completes_with_zero_regions() {
        let server = MockServer::start().await;
        mount_landing(&server).await;
        mount_csv(&server, "Tinklas;Objekto tipas;h0\nESO;Namas;1,0\n").await;

        let h = harness(&server.uri());
        let outcome = h.pipeline.process(&july(), &CancellationToken::new()).await;

        assert!(outcome.success);
        assert_eq!(outcome.regions_aggregated, 0);
        assert!(h.consumption.rows().is_empty());
        assert_eq!(h.runs.runs()[0].status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_run_keeps_last_status() {
        let server = MockServer::start().await;
        mount_landing(&server).await;
        mount_csv(&server, CSV_BODY).await;

        let h = harness(&server.uri());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = h.pipeline.process(&july(), &cancel).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("processing cancelled")
        );

        // The record stays in its last reached status, not Failed.
        let run = &h.runs.runs()[0];
        assert_eq!(run.status, RunStatus::Downloading);
        assert!(run.completed_at.is_none());
    }
}
