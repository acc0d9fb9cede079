//! Record shapes for the receiving and MOS workflows.

pub mod inventory_record;
pub mod mos_record;

pub use inventory_record::{InventoryRecord, NewInventoryRecord};
pub use mos_record::{MosReason, MosRecord, NewMosRecord};

use uuid::Uuid;

/// Smallest quantity a record may carry.
pub const MIN_QUANTITY: u32 = 1;

/// Produces a fresh record identifier.
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

/// Raises anything below [`MIN_QUANTITY`] to the minimum.
pub fn clamp_quantity(quantity: u32) -> u32 {
    quantity.max(MIN_QUANTITY)
}

/// Behaviour shared by every record kept in a [`crate::repositories::RecordRepository`].
pub trait Record: Clone + Send + Sync + 'static {
    /// Human readable name used in error messages and logs
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    fn quantity(&self) -> u32;

    /// Stores `quantity`, clamped to [`MIN_QUANTITY`].
    fn set_quantity(&mut self, quantity: u32);

    fn increment_quantity(&mut self) -> u32 {
        let next = self.quantity().saturating_add(1);
        self.set_quantity(next);
        self.quantity()
    }

    /// Decrements by one, never going below [`MIN_QUANTITY`].
    fn decrement_quantity(&mut self) -> u32 {
        let next = self.quantity().saturating_sub(1);
        self.set_quantity(next);
        self.quantity()
    }
}

/// Trims a free-text field, mapping blank input to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
