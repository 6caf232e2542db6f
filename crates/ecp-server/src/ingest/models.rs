//! Core types for the monthly consumption pipeline

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use ecp_common::types::TargetPeriod;

/// One parsed CSV row: region, building category, and hourly consumption
/// values keyed by 0-based column index.
///
/// Transient parser output; never persisted. An hour missing from `hourly`
/// means the source cell was empty or unparseable, not that it was zero.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub region: String,
    pub category: String,
    pub hourly: BTreeMap<usize, Decimal>,
}

impl RawRecord {
    pub fn new(region: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            category: category.into(),
            hourly: BTreeMap::new(),
        }
    }

    /// Sum of all hourly values present in this record.
    pub fn total(&self) -> Decimal {
        self.hourly.values().copied().sum()
    }
}

/// One (region, month) consumption aggregate.
///
/// Logically keyed by (region, month): at most one live row per region per
/// month, enforced by the store's delete-before-insert supersession rather
/// than a database constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RegionConsumption {
    pub id: Uuid,
    pub region: String,
    pub category: String,
    /// First day of the aggregated month.
    pub month: NaiveDate,
    pub total_consumption: Decimal,
    /// Number of raw records folded into this aggregate.
    pub record_count: i64,
    pub processed_at: DateTime<Utc>,
    pub source_file: String,
}

/// Status of a pipeline run.
///
/// The state machine is strictly linear with no backward transitions:
/// `Started → Downloading → Parsing → Aggregating → Saving → Completed`,
/// with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Downloading,
    Parsing,
    Aggregating,
    Saving,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Downloading => "downloading",
            RunStatus::Parsing => "parsing",
            RunStatus::Aggregating => "aggregating",
            RunStatus::Saving => "saving",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Completed and Failed are terminal; anything else observed by a reader
    /// is an in-flight (or abandoned) run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        use RunStatus::*;
        match (self, next) {
            (Started, Downloading)
            | (Downloading, Parsing)
            | (Parsing, Aggregating)
            | (Aggregating, Saving)
            | (Saving, Completed) => true,
            (from, Failed) if !from.is_terminal() => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(RunStatus::Started),
            "downloading" => Ok(RunStatus::Downloading),
            "parsing" => Ok(RunStatus::Parsing),
            "aggregating" => Ok(RunStatus::Aggregating),
            "saving" => Ok(RunStatus::Saving),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(anyhow::anyhow!("unknown run status: {}", s)),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record for one pipeline invocation (maps to `processing_runs`).
///
/// Created when the run starts and updated in place as it advances; the
/// orchestrator that created a run is its sole writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRun {
    pub id: Uuid,
    pub period_label: String,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub records_processed: i64,
    pub records_filtered: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingRun {
    /// Create a fresh run record in `Started` state.
    pub fn begin(period: &TargetPeriod) -> Self {
        Self {
            id: Uuid::new_v4(),
            period_label: period.label(),
            status: RunStatus::Started,
            error_message: None,
            records_processed: 0,
            records_filtered: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Structured outcome of a pipeline run.
///
/// Always returned, never thrown: a caller learns about a failed month from
/// `success == false` and `error_message`, not from a propagated error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    pub period: String,
    pub records_processed: i64,
    pub records_filtered: i64,
    pub regions_aggregated: i64,
    pub error_message: Option<String>,
    pub duration_secs: f64,
}
