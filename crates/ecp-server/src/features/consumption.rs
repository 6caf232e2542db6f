//! Read-side consumption aggregation over a month range
//!
//! GET /consumption?from=YYYY-MM&to=YYYY-MM re-aggregates persisted
//! per-region rows by (region, month). With no range given, it covers the
//! latest persisted month and the month before it; with no data at all it
//! falls back to the current calendar month.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ecp_common::types::{current_month, previous_month};

use crate::db::ConsumptionStore;
use crate::error::AppError;
use crate::ingest::models::RegionConsumption;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/consumption", get(get_consumption))
}

#[derive(Debug, Deserialize)]
pub struct ConsumptionParams {
    /// Inclusive range start, `YYYY-MM`.
    pub from: Option<String>,
    /// Inclusive range end, `YYYY-MM`.
    pub to: Option<String>,
}

/// One (region, month) summary line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSummary {
    pub region: String,
    pub month: NaiveDate,
    pub total_consumption: Decimal,
    pub record_count: i64,
    /// Total divided by record count; zero when the count is zero.
    pub average_consumption: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConsumptionResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub summaries: Vec<ConsumptionSummary>,
}

async fn get_consumption(
    State(state): State<AppState>,
    Query(params): Query<ConsumptionParams>,
) -> Result<Json<ConsumptionResponse>, AppError> {
    let from = params
        .from
        .as_deref()
        .map(parse_month_param)
        .transpose()?;
    let to = params.to.as_deref().map(parse_month_param).transpose()?;

    let (from, to) = resolve_range(from, to, state.consumption.latest_month().await?);
    if from > to {
        return Err(AppError::Validation(format!(
            "from ({}) is after to ({})",
            from, to
        )));
    }

    let rows = state.consumption.fetch_range(from, to).await?;
    let summaries = summarize(&rows);

    Ok(Json(ConsumptionResponse {
        from,
        to,
        summaries,
    }))
}

/// Fill in missing range endpoints.
///
/// A single given endpoint yields a one-month range. With neither given,
/// the range covers the latest persisted month and the month before it, or
/// the current calendar month when nothing is persisted yet.
fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    latest: Option<NaiveDate>,
) -> (NaiveDate, NaiveDate) {
    match (from, to) {
        (Some(f), Some(t)) => (f, t),
        (Some(f), None) => (f, f),
        (None, Some(t)) => (t, t),
        (None, None) => match latest {
            Some(latest) => (previous_month(latest), latest),
            None => {
                let now = current_month();
                (now, now)
            }
        },
    }
}

/// Group rows by (region, month), summing totals and counts.
///
/// Output order is month then region, which the BTreeMap key gives for
/// free.
pub fn summarize(rows: &[RegionConsumption]) -> Vec<ConsumptionSummary> {
    let mut groups: BTreeMap<(NaiveDate, &str), (Decimal, i64)> = BTreeMap::new();
    for row in rows {
        let entry = groups
            .entry((row.month, row.region.as_str()))
            .or_insert((Decimal::ZERO, 0));
        entry.0 += row.total_consumption;
        entry.1 += row.record_count;
    }

    groups
        .into_iter()
        .map(|((month, region), (total, count))| ConsumptionSummary {
            region: region.to_string(),
            month,
            total_consumption: total,
            record_count: count,
            average_consumption: if count == 0 {
                Decimal::ZERO
            } else {
                total / Decimal::from(count)
            },
        })
        .collect()
}

/// Parse a `YYYY-MM` query parameter into the first day of that month.
fn parse_month_param(value: &str) -> Result<NaiveDate, AppError> {
    let mut parts = value.splitn(2, '-');
    let parsed = match (parts.next(), parts.next()) {
        (Some(year), Some(month)) => match (year.parse::<i32>(), month.parse::<u32>()) {
            (Ok(year), Ok(month)) => NaiveDate::from_ymd_opt(year, month, 1),
            _ => None,
        },
        _ => None,
    };

    parsed.ok_or_else(|| {
        AppError::Validation(format!("invalid month '{}', expected YYYY-MM", value))
    })
}
