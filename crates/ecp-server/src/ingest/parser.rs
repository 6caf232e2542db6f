//! Permissive parser for the portal's semicolon-delimited CSV extracts
//!
//! The extracts use Lithuanian locale conventions: semicolon field
//! separators and comma decimal separators. Files arrive with or without a
//! UTF-8 byte-order mark and with occasional malformed rows, so the parser
//! validates only the header shape and skips bad rows instead of aborting.

use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::io::Read;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::IngestError;
use super::models::RawRecord;

/// Column index of the region identifier ("Tinklas").
const COL_REGION: usize = 0;

/// Column index of the building category ("Objekto tipas").
const COL_CATEGORY: usize = 1;

/// First hourly-value column; everything from here on is consumption data.
const COL_FIRST_HOUR: usize = 2;

/// How many rows to parse between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1_000;

/// Outcome of a full parse pass over one file.
#[derive(Debug, Default)]
pub struct ParseSummary {
    pub records: Vec<RawRecord>,
    /// Data rows seen, including skipped ones. Excludes the header.
    pub rows_read: u64,
    /// Rows dropped for an empty region/category or a row-level error.
    pub rows_skipped: u64,
}

/// Streaming reader over one downloaded extract.
///
/// Construction consumes the header row and validates its shape; the
/// stream is single-pass and not restartable.
#[derive(Debug)]
pub struct ConsumptionCsvReader<R: Read> {
    reader: csv::Reader<R>,
    row: StringRecord,
    row_number: u64,
}

impl<R: Read> ConsumptionCsvReader<R> {
    /// Wrap `input` and validate the header row.
    ///
    /// A header with fewer than three columns cannot carry any hourly data
    /// and fails before a single row is read. Header labels beyond the
    /// first two columns are informational only; hourly columns are
    /// addressed by position, not by name.
    pub fn new(input: R) -> Result<Self, IngestError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .trim(Trim::All)
            .has_headers(false)
            .from_reader(input);

        let mut header = StringRecord::new();
        if !reader.read_record(&mut header)? {
            return Err(IngestError::InvalidHeader { columns: 0 });
        }
        if header.len() < COL_FIRST_HOUR + 1 {
            return Err(IngestError::InvalidHeader {
                columns: header.len(),
            });
        }

        debug!(columns = header.len(), "validated extract header");

        Ok(Self {
            reader,
            row: StringRecord::new(),
            row_number: 1,
        })
    }

    /// Parse every remaining row, skipping malformed ones.
    pub fn parse_all(mut self, cancel: &CancellationToken) -> Result<ParseSummary, IngestError> {
        let mut summary = ParseSummary::default();

        loop {
            if summary.rows_read % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }

            self.row_number += 1;
            match self.reader.read_record(&mut self.row) {
                Ok(true) => {}
                Ok(false) => break,
                // A malformed row (bad encoding, broken quoting) costs only
                // itself; the reader resumes at the next row.
                Err(e) => {
                    warn!(row = self.row_number, error = %e, "skipping unreadable row");
                    summary.rows_read += 1;
                    summary.rows_skipped += 1;
                    continue;
                }
            }

            summary.rows_read += 1;
            match parse_row(&self.row) {
                Some(record) => summary.records.push(record),
                None => {
                    warn!(row = self.row_number, "skipping row with empty region or category");
                    summary.rows_skipped += 1;
                }
            }
        }

        debug!(
            records = summary.records.len(),
            rows_read = summary.rows_read,
            rows_skipped = summary.rows_skipped,
            "finished parsing extract"
        );

        Ok(summary)
    }
}

/// Convert one data row, or `None` when region or category is blank.
fn parse_row(row: &StringRecord) -> Option<RawRecord> {
    let region = row.get(COL_REGION).unwrap_or("").trim_start_matches('\u{feff}');
    let category = row.get(COL_CATEGORY).unwrap_or("");
    if region.is_empty() || category.is_empty() {
        return None;
    }

    let mut record = RawRecord::new(region, category);
    for (hour, field) in row.iter().skip(COL_FIRST_HOUR).enumerate() {
        if let Some(value) = parse_decimal_cell(field) {
            record.hourly.insert(hour, value);
        }
    }
    Some(record)
}

/// Parse one hourly cell, accepting both comma and period decimal
/// separators. Blank or unparseable cells are omitted rather than zeroed.
fn parse_decimal_cell(field: &str) -> Option<Decimal> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse::<Decimal>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    fn parse(input: &str) -> ParseSummary {
        ConsumptionCsvReader::new(Cursor::new(input.as_bytes().to_vec()))
            .unwrap()
            .parse_all(&CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_comma_and_period_decimals_agree() {
        let summary = parse("Tinklas;Objekto tipas;00:00-01:00\nESO;Butas;1,5\nESO;Butas;1.5\n");
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.records[0].hourly[&0], dec!(1.5));
        assert_eq!(summary.records[0].hourly[&0], summary.records[1].hourly[&0]);
    }

    #[test]
    fn test_empty_region_or_category_skips_row() {
        let input = "Tinklas;Objekto tipas;h0\n\
                     ESO;Butas;1,0\n\
                     ;Butas;2,0\n\
                     ESO;  ;3,0\n\
                     Regionas2;Namas;4,0\n";
        let summary = parse(input);

        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.rows_read, 4);
        assert_eq!(summary.rows_skipped, 2);
        assert_eq!(summary.records[0].region, "ESO");
        assert_eq!(summary.records[1].region, "Regionas2");
    }

    #[test]
    fn test_unparseable_hourly_cell_is_omitted() {
        let summary = parse("Tinklas;Objekto tipas;h0;h1;h2\nESO;Butas;1,5;oops;2,5\n");
        let record = &summary.records[0];

        assert_eq!(record.hourly.len(), 2);
        assert_eq!(record.hourly[&0], dec!(1.5));
        assert!(!record.hourly.contains_key(&1));
        assert_eq!(record.hourly[&2], dec!(2.5));
    }

    #[test]
    fn test_blank_hourly_cell_is_omitted_not_zeroed() {
        let summary = parse("Tinklas;Objekto tipas;h0;h1\nESO;Butas;;2,0\n");
        let record = &summary.records[0];

        assert!(!record.hourly.contains_key(&0));
        assert_eq!(record.hourly[&1], dec!(2.0));
    }

    #[test]
    fn test_negative_and_zero_values_preserved() {
        let summary = parse("Tinklas;Objekto tipas;h0;h1\nESO;Butas;-0,5;0\n");
        let record = &summary.records[0];

        assert_eq!(record.hourly[&0], dec!(-0.5));
        assert_eq!(record.hourly[&1], dec!(0));
    }

    #[test]
    fn test_two_column_header_is_fatal() {
        let err = ConsumptionCsvReader::new(Cursor::new(b"Tinklas;Objekto tipas\n".to_vec()))
            .unwrap_err();
        match err {
            IngestError::InvalidHeader { columns } => assert_eq!(columns, 2),
            other => panic!("expected InvalidHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let err = ConsumptionCsvReader::new(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, IngestError::InvalidHeader { columns: 0 }));
    }

    #[test]
    fn test_utf8_bom_is_tolerated() {
        let mut input = b"\xef\xbb\xbf".to_vec();
        input.extend_from_slice(b"Tinklas;Objekto tipas;h0\nESO;Butas;1,0\n");

        let summary = ConsumptionCsvReader::new(Cursor::new(input))
            .unwrap()
            .parse_all(&CancellationToken::new())
            .unwrap();

        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.records[0].region, "ESO");
    }

    #[test]
    fn test_short_row_does_not_fail() {
        let summary = parse("Tinklas;Objekto tipas;h0;h1\nESO;Butas\n");
        let record = &summary.records[0];

        assert_eq!(record.region, "ESO");
        assert!(record.hourly.is_empty());
    }

    #[test]
    fn test_blank_lines_ignored() {
        let summary = parse("Tinklas;Objekto tipas;h0\n\nESO;Butas;1,0\n\n");
        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.rows_skipped, 0);
    }

    #[test]
    fn test_arbitrary_hourly_column_count() {
        let header: String = (0..48).fold("Tinklas;Objekto tipas".to_string(), |acc, h| {
            format!("{};h{}", acc, h)
        });
        let values: String = (0..48).fold("ESO;Butas".to_string(), |acc, _| {
            format!("{};1,0", acc)
        });
        let summary = parse(&format!("{}\n{}\n", header, values));

        assert_eq!(summary.records[0].hourly.len(), 48);
        assert_eq!(summary.records[0].total(), dec!(48));
    }

    #[test]
    fn test_cancellation_stops_parse() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reader =
            ConsumptionCsvReader::new(Cursor::new(b"a;b;c\nESO;Butas;1\n".to_vec())).unwrap();
        let err = reader.parse_all(&cancel).unwrap_err();

        assert!(matches!(err, IngestError::Cancelled));
    }
}
