use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{InventoryRecord, MosRecord, Record};

/// Owned, ordered collection of records.
///
/// Every mutation goes through this type so identity uniqueness and the
/// quantity floor hold for the whole collection. Records are kept newest
/// first.
#[derive(Debug, Clone)]
pub struct RecordRepository<T: Record> {
    records: Vec<T>,
}

pub type InventoryRepository = RecordRepository<InventoryRecord>;
pub type MosRepository = RecordRepository<MosRecord>;

impl<T: Record> Default for RecordRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> RecordRepository<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn list(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// Prepends `record`, so the newest entry is listed first.
    pub fn insert(&mut self, mut record: T) -> Result<&T, ServiceError> {
        if self.get(record.id()).is_some() {
            return Err(ServiceError::DuplicateId(record.id()));
        }
        let quantity = record.quantity();
        record.set_quantity(quantity);
        self.records.insert(0, record);
        Ok(&self.records[0])
    }

    /// Applies `f` to the record with `id` in place.
    pub fn update<F>(&mut self, id: Uuid, f: F) -> Result<&T, ServiceError>
    where
        F: FnOnce(&mut T),
    {
        let position = self
            .records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| ServiceError::NotFound(format!("{} {} not found", T::KIND, id)))?;

        let record = &mut self.records[position];
        f(record);
        // the closure cannot change identity or break the quantity floor
        debug_assert_eq!(record.id(), id);
        let quantity = record.quantity();
        record.set_quantity(quantity);
        Ok(&self.records[position])
    }

    pub fn increment_quantity(&mut self, id: Uuid) -> Result<&T, ServiceError> {
        self.update(id, |r| {
            r.increment_quantity();
        })
    }

    pub fn decrement_quantity(&mut self, id: Uuid) -> Result<&T, ServiceError> {
        self.update(id, |r| {
            r.decrement_quantity();
        })
    }

    /// Empties the collection, returning how many records were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        removed
    }

    /// Swaps in a whole new collection, as a report import does.
    pub fn replace_all(&mut self, records: Vec<T>) -> Result<usize, ServiceError> {
        let mut next = Self::new();
        // insert in reverse so the incoming order is preserved after prepending
        for record in records.into_iter().rev() {
            next.insert(record)?;
        }
        let count = next.len();
        *self = next;
        Ok(count)
    }
}
