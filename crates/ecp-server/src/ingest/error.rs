//! Error taxonomy for the ingestion pipeline
//!
//! Everything here bubbles up uncaught to the orchestrator, which is the
//! single place that converts an error into a `Failed` run plus a structured
//! outcome. Row-level problems are not errors at all; the parser skips those
//! rows and keeps going.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the locator, fetcher, and parser.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The landing page was fetched fine but contains no link to the file.
    /// Distinct from a transport failure: the file likely does not exist for
    /// that period, or the portal layout changed.
    #[error("file {file_name} is not listed on the portal page")]
    FileNotListed { file_name: String },

    /// A non-retryable HTTP status; aborts without further attempts.
    #[error("request to {url} failed with non-retryable status {status}")]
    FatalStatus { url: String, status: StatusCode },

    /// The retry budget was exhausted; carries the last underlying failure.
    #[error("giving up on {url} after {attempts} attempts: {source}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: FetchFailure,
    },

    /// The CSV header row has too few columns for any hourly data to exist.
    #[error("CSV header has {columns} column(s); at least 3 required (region, category, hours)")]
    InvalidHeader { columns: usize },

    /// A CSV-level failure outside any single row (e.g. unreadable input).
    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Cooperative cancellation was requested; the run is abandoned in
    /// whatever status it last reached.
    #[error("processing was cancelled")]
    Cancelled,
}

/// The last underlying cause of a failed fetch attempt.
#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error("retryable status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("no attempts were made")]
    NoAttempts,
}
