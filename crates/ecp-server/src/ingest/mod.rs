//! Monthly consumption ingestion pipeline
//!
//! Leaf-first: `locator` resolves the download URL, `fetcher` downloads
//! with retries, `parser` turns the CSV into records, `aggregate` folds
//! them per region, and `orchestrator` sequences the phases against the
//! persistence stores.

pub mod aggregate;
pub mod error;
pub mod fetcher;
pub mod locator;
pub mod models;
pub mod orchestrator;
pub mod parser;

pub use error::IngestError;
pub use orchestrator::MonthlyPipeline;
