//! CSV reports for the receiving and MOS collections.
//!
//! Both exports share one escaping rule: a field is quoted, with embedded
//! quotes doubled, only when it contains a comma, a quote or a newline.
//! Timestamps are written as en-US locale dates (`M/D/YYYY`); the time of
//! day is not part of a report.

pub mod csv_import;
pub mod inventory_csv;
pub mod mos_csv;

use chrono::{DateTime, NaiveDate, Utc};

pub use csv_import::{parse, ImportReport};
pub use inventory_csv::{export_filename, serialize, serialize_with_banner, INVENTORY_CSV_HEADER};

/// Date layout used for report cells
pub const REPORT_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Date layout used inside export file names
pub const FILENAME_DATE_FORMAT: &str = "%-m-%-d-%Y";

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const DELIMITER: char = ',';

pub fn escape_field(value: &str) -> String {
    if value.contains(DELIMITER) || value.contains('"') || value.contains('\n') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

pub fn render_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(REPORT_DATE_FORMAT).to_string()
}

pub(crate) fn report_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}.csv", prefix, date.format(FILENAME_DATE_FORMAT))
}

/// Joins a header and already-escaped rows into a document.
pub(crate) fn build_document<I>(header: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let delimiter = DELIMITER.to_string();
    let mut lines = vec![header.join(&delimiter)];
    lines.extend(rows.into_iter().map(|row| row.join(&delimiter)));
    lines.join("\n")
}
