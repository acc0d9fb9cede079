use serde::{Deserialize, Serialize};

use crate::models::{InventoryRecord, NewInventoryRecord};

/// What a create does when the candidate matches an existing record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Refuse the insert and report the collision
    #[default]
    Reject,
    /// Insert anyway and flag the outcome
    Warn,
}

/// Two records collide when SAP number and barcode match exactly.
///
/// Comparison is case-sensitive and an absent barcode equals another absent
/// barcode.
pub fn matches(candidate: &NewInventoryRecord, existing: &InventoryRecord) -> bool {
    candidate.sap_number == existing.sap_number && candidate.barcode == existing.barcode
}

pub fn is_duplicate(candidate: &NewInventoryRecord, existing: &[InventoryRecord]) -> bool {
    find_duplicate(candidate, existing).is_some()
}

/// First record in `existing` that collides with `candidate`.
pub fn find_duplicate<'a>(
    candidate: &NewInventoryRecord,
    existing: &'a [InventoryRecord],
) -> Option<&'a InventoryRecord> {
    existing.iter().find(|record| matches(candidate, record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(sap: &str, barcode: Option<&str>) -> NewInventoryRecord {
        NewInventoryRecord {
            store_location: "Store 118".into(),
            sap_number: sap.into(),
            quantity: 1,
            barcode: barcode.map(str::to_string),
            photo_url: None,
        }
    }

    fn stored(sap: &str, barcode: Option<&str>) -> InventoryRecord {
        InventoryRecord::create(candidate(sap, barcode), "BOL-1")
    }

    #[test]
    fn truth_table() {
        let existing = vec![stored("100", Some("ABC"))];

        assert!(is_duplicate(&candidate("100", Some("ABC")), &existing));
        assert!(!is_duplicate(&candidate("100", Some("XYZ")), &existing));
        assert!(!is_duplicate(&candidate("200", Some("ABC")), &existing));
        assert!(!is_duplicate(&candidate("100", None), &existing));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let existing = vec![stored("100", Some("abc"))];
        assert!(!is_duplicate(&candidate("100", Some("ABC")), &existing));
    }

    #[test]
    fn missing_barcodes_compare_equal() {
        let existing = vec![stored("100", None)];
        assert!(is_duplicate(&candidate("100", None), &existing));
    }

    #[test]
    fn empty_collection_never_collides() {
        assert!(!is_duplicate(&candidate("100", Some("ABC")), &[]));
    }

    #[test]
    fn find_duplicate_returns_first_match() {
        let older = stored("100", Some("ABC"));
        let newer = stored("100", Some("ABC"));
        let existing = vec![newer.clone(), older];

        let hit = find_duplicate(&candidate("100", Some("ABC")), &existing).unwrap();
        assert_eq!(hit.id, newer.id);
    }

    #[test]
    fn policy_deserializes_from_lowercase() {
        let policy: DuplicatePolicy = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(policy, DuplicatePolicy::Warn);
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::Reject);
    }
}
