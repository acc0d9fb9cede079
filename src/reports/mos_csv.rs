use chrono::NaiveDate;

use super::{build_document, escape_field, render_date, report_filename};
use crate::models::MosRecord;

pub const MOS_CSV_HEADER: [&str; 5] = ["Store Location", "Code", "Quantity", "Reason", "Timestamp"];

pub fn serialize(records: &[MosRecord]) -> String {
    build_document(
        &MOS_CSV_HEADER,
        records.iter().map(|record| {
            vec![
                escape_field(&record.store_location),
                escape_field(&record.code),
                record.quantity.to_string(),
                record.reason.as_str().to_string(),
                escape_field(&render_date(&record.timestamp)),
            ]
        }),
    )
}

pub fn export_filename(date: NaiveDate) -> String {
    report_filename("mos-report", date)
}
