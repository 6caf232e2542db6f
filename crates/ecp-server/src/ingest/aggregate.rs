//! Filtering and per-region aggregation of parsed records

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use ecp_common::types::TargetPeriod;

use super::models::{RawRecord, RegionConsumption};

/// Building-category marker for apartment records ("Objekto tipas" column).
pub const APARTMENT_CATEGORY: &str = "Butas";

/// What aggregation did to the input batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStats {
    /// Records matching the apartment category.
    pub records_matched: u64,
    /// Records dropped by the category filter.
    pub records_filtered: u64,
}

/// Filter `records` to apartments and fold them into one aggregate per
/// region for `period`.
///
/// Category matching is a case-insensitive exact comparison. An empty input,
/// or one where no record matches, yields an empty output rather than an
/// error. Regions come out in lexicographic order, which also makes the
/// fold associative over row order for tests.
pub fn aggregate_by_region(
    records: &[RawRecord],
    period: &TargetPeriod,
) -> (Vec<RegionConsumption>, AggregateStats) {
    let mut groups: BTreeMap<&str, (Decimal, i64)> = BTreeMap::new();
    let mut stats = AggregateStats {
        records_matched: 0,
        records_filtered: 0,
    };

    for record in records {
        if !record.category.eq_ignore_ascii_case(APARTMENT_CATEGORY) {
            stats.records_filtered += 1;
            continue;
        }
        stats.records_matched += 1;

        let entry = groups
            .entry(record.region.as_str())
            .or_insert((Decimal::ZERO, 0));
        entry.0 += record.total();
        entry.1 += 1;
    }

    let month = period.month_start();
    let source_file = period.file_name();
    let processed_at = Utc::now();

    let aggregates: Vec<RegionConsumption> = groups
        .into_iter()
        .map(|(region, (total, count))| RegionConsumption {
            id: Uuid::new_v4(),
            region: region.to_string(),
            category: APARTMENT_CATEGORY.to_string(),
            month,
            total_consumption: total,
            record_count: count,
            processed_at,
            source_file: source_file.clone(),
        })
        .collect();

    debug!(
        period = %period,
        regions = aggregates.len(),
        matched = stats.records_matched,
        filtered = stats.records_filtered,
        "aggregated consumption by region"
    );

    (aggregates, stats)
}
