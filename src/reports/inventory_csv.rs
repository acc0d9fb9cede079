use chrono::NaiveDate;

use super::{build_document, escape_field, render_date, report_filename};
use crate::models::InventoryRecord;

/// Column order shared with [`super::csv_import::parse`].
pub const INVENTORY_CSV_HEADER: [&str; 7] = [
    "Store Location",
    "BOL #",
    "SAP Item #",
    "Quantity",
    "Barcode",
    "Timestamp",
    "Photo URL",
];

/// Renders records as a CSV document, one row per record in collection order.
pub fn serialize(records: &[InventoryRecord]) -> String {
    build_document(&INVENTORY_CSV_HEADER, records.iter().map(record_row))
}

/// Like [`serialize`], preceded by a single banner line and a blank line.
///
/// The importer skips everything up to the first blank line, so a bannered
/// report still imports. A blank banner yields the plain report.
pub fn serialize_with_banner(records: &[InventoryRecord], banner: &str) -> String {
    let banner = banner.replace(['\r', '\n'], " ");
    let banner = banner.trim();
    if banner.is_empty() {
        return serialize(records);
    }
    format!("{}\n\n{}", banner, serialize(records))
}

pub fn export_filename(date: NaiveDate) -> String {
    report_filename("inventory-report", date)
}

fn record_row(record: &InventoryRecord) -> Vec<String> {
    vec![
        escape_field(&record.store_location),
        escape_field(&record.bol_number),
        escape_field(&record.sap_number),
        record.quantity.to_string(),
        escape_field(record.barcode.as_deref().unwrap_or_default()),
        escape_field(&render_date(&record.timestamp)),
        escape_field(record.photo_url.as_deref().unwrap_or_default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewInventoryRecord;
    use chrono::{TimeZone, Utc};

    fn record(store: &str, sap: &str, barcode: Option<&str>) -> InventoryRecord {
        let mut record = InventoryRecord::create(
            NewInventoryRecord {
                store_location: store.into(),
                sap_number: sap.into(),
                quantity: 4,
                barcode: barcode.map(Into::into),
                photo_url: None,
            },
            "BOL-9",
        );
        record.timestamp = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();
        record
    }

    #[test]
    fn header_is_fixed_even_for_empty_collection() {
        assert_eq!(
            serialize(&[]),
            "Store Location,BOL #,SAP Item #,Quantity,Barcode,Timestamp,Photo URL"
        );
    }

    #[test]
    fn rows_follow_collection_order_and_blank_optionals() {
        let records = vec![record("Store 2", "222", None), record("Store 1", "111", Some("X1"))];
        let csv = serialize(&records);
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Store 2,BOL-9,222,4,,10/17/2026,");
        assert_eq!(lines[2], "Store 1,BOL-9,111,4,X1,10/17/2026,");
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn comma_in_store_location_is_quoted() {
        let csv = serialize(&[record("Aisle 3, Bin 2", "1", Some("X"))]);
        assert_eq!(
            csv.lines().nth(1),
            Some("\"Aisle 3, Bin 2\",BOL-9,1,4,X,10/17/2026,")
        );
    }

    #[test]
    fn banner_is_separated_by_blank_line() {
        let csv = serialize_with_banner(&[record("Store 1", "1", None)], "Photos: https://p.example\n");
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "Photos: https://p.example");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], INVENTORY_CSV_HEADER.join(","));
    }

    #[test]
    fn blank_banner_is_dropped() {
        let records = [record("Store 1", "1", None)];
        let csv = serialize_with_banner(&records, "  \n ");
        assert_eq!(csv, serialize(&records));

        let report = crate::reports::parse(&csv).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn filename_uses_dashed_locale_date() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(export_filename(date), "inventory-report-1-5-2026.csv");
    }
}
