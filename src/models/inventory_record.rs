use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{clamp_quantity, generate_id, Record};

/// One pallet or tag received at a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub store_location: String,
    pub bol_number: String,
    pub sap_number: String,
    pub quantity: u32,
    pub barcode: Option<String>,
    pub photo_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Field values for a record that has not been committed yet.
///
/// Carries no `id`, `timestamp` or `bol_number`: those are assigned when the
/// candidate is committed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryRecord {
    pub store_location: String,
    pub sap_number: String,
    pub quantity: u32,
    pub barcode: Option<String>,
    pub photo_url: Option<String>,
}

impl InventoryRecord {
    /// Commits a candidate with a fresh id and the current time.
    pub fn create(candidate: NewInventoryRecord, bol_number: &str) -> Self {
        Self {
            id: generate_id(),
            store_location: candidate.store_location,
            bol_number: bol_number.to_string(),
            sap_number: candidate.sap_number,
            quantity: clamp_quantity(candidate.quantity),
            barcode: candidate.barcode,
            photo_url: candidate.photo_url,
            timestamp: Utc::now(),
        }
    }

    /// Rebuilds a record recovered from a report; the id is always new.
    pub fn restored(
        store_location: String,
        bol_number: String,
        sap_number: String,
        quantity: u32,
        barcode: Option<String>,
        photo_url: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id(),
            store_location,
            bol_number,
            sap_number,
            quantity: clamp_quantity(quantity),
            barcode,
            photo_url,
            timestamp,
        }
    }

    /// Replaces every mutable field. `id` and `timestamp` are kept.
    pub fn apply_edit(&mut self, candidate: NewInventoryRecord, bol_number: &str) {
        self.store_location = candidate.store_location;
        self.sap_number = candidate.sap_number;
        self.quantity = clamp_quantity(candidate.quantity);
        self.barcode = candidate.barcode;
        self.photo_url = candidate.photo_url;
        self.bol_number = bol_number.to_string();
    }

    /// The editable fields of this record, as a form would be repopulated.
    pub fn to_candidate(&self) -> NewInventoryRecord {
        NewInventoryRecord {
            store_location: self.store_location.clone(),
            sap_number: self.sap_number.clone(),
            quantity: self.quantity,
            barcode: self.barcode.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

impl Record for InventoryRecord {
    const KIND: &'static str = "Inventory record";

    fn id(&self) -> Uuid {
        self.id
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn set_quantity(&mut self, quantity: u32) {
        self.quantity = clamp_quantity(quantity);
    }
}
