use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::REPORT_DATE_FORMAT;
use crate::errors::ServiceError;
use crate::models::{non_blank, InventoryRecord};

/// Rows with fewer values than this are dropped.
pub const MIN_FIELDS: usize = 6;

/// Records recovered from a report plus how many candidate rows were dropped.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub records: Vec<InventoryRecord>,
    pub skipped: usize,
}

/// Reconstructs records from a previously exported (or hand-written) report.
///
/// Anything before the first blank line is treated as a preamble and the line
/// after it is the header; without a blank line the first line is the header.
/// Header content is not checked. Values are split on every comma, so a quoted
/// field that contains a comma does not survive an import.
///
/// Every recovered record gets a new id. Fails only when no row is usable.
pub fn parse(text: &str) -> Result<ImportReport, ServiceError> {
    let lines: Vec<&str> = text
        .trim_end()
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let header = header_index(&lines);
    debug!(header_line = header, total_lines = lines.len(), "parsing inventory csv");

    let mut records = Vec::new();
    let mut skipped = 0;

    for (offset, line) in lines.iter().enumerate().skip(header + 1) {
        if line.trim().is_empty() {
            continue;
        }

        let values = split_row(line);
        if values.len() < MIN_FIELDS {
            skipped += 1;
            debug!(line = offset + 1, values = values.len(), "dropping short csv row");
            continue;
        }

        match row_to_record(values) {
            Some(record) => records.push(record),
            None => {
                skipped += 1;
                warn!(line = offset + 1, "dropping csv row with unreadable timestamp");
            }
        }
    }

    if records.is_empty() {
        return Err(ServiceError::ImportParseError(
            "No valid items found in CSV".to_string(),
        ));
    }

    Ok(ImportReport { records, skipped })
}

/// Splits one line on every comma and unquotes values wrapped in quotes.
pub fn split_row(line: &str) -> Vec<String> {
    line.split(',').map(unquote).collect()
}

fn header_index(lines: &[&str]) -> usize {
    lines
        .iter()
        .position(|line| line.trim().is_empty())
        .map(|blank| blank + 1)
        .unwrap_or(0)
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].replace("\"\"", "\"")
    } else {
        value.to_string()
    }
}

fn row_to_record(values: Vec<String>) -> Option<InventoryRecord> {
    let mut values = values.into_iter();
    let store_location = values.next()?;
    let bol_number = values.next()?;
    let sap_number = values.next()?;
    let quantity = parse_quantity(&values.next()?);
    let barcode = non_blank(values.next().as_deref());
    let timestamp = parse_timestamp(&values.next()?)?;
    let photo_url = non_blank(values.next().as_deref());

    Some(InventoryRecord::restored(
        store_location,
        bol_number,
        sap_number,
        quantity,
        barcode,
        photo_url,
        timestamp,
    ))
}

/// Reads the leading decimal digits of a cell. Cells without digits, zero and
/// negative values come back as the record minimum.
fn parse_quantity(value: &str) -> u32 {
    let value = value.trim_start();
    if value.starts_with('-') {
        return crate::models::MIN_QUANTITY;
    }
    let digits: String = value
        .trim_start_matches('+')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let parsed = digits.parse::<u64>().unwrap_or(0);
    crate::models::clamp_quantity(u32::try_from(parsed).unwrap_or(u32::MAX))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, REPORT_DATE_FORMAT) {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
