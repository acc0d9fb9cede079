use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{MosRecord, NewMosRecord};
use crate::reports::{mos_csv, CSV_CONTENT_TYPE};
use crate::repositories::MosRepository;
use crate::services::receiving::CsvExport;

/// Markout/shrink tracking. Same lifecycle as receiving, no duplicate checks.
#[derive(Clone)]
pub struct MosService {
    records: Arc<RwLock<MosRepository>>,
    event_sender: EventSender,
}

impl MosService {
    pub fn new(event_sender: EventSender) -> Self {
        Self {
            records: Arc::new(RwLock::new(MosRepository::new())),
            event_sender,
        }
    }

    pub async fn list(&self) -> Vec<MosRecord> {
        self.records.read().await.list().to_vec()
    }

    #[instrument(skip(self, candidate), fields(code = %candidate.code))]
    pub async fn create(&self, candidate: NewMosRecord) -> Result<MosRecord, ServiceError> {
        candidate.validate()?;

        let record = self
            .records
            .write()
            .await
            .insert(MosRecord::create(candidate))?
            .clone();

        info!(record_id = %record.id, reason = %record.reason, "MOS record created");
        self.event_sender
            .send_or_log(Event::MosRecordCreated(record.id))
            .await;
        Ok(record)
    }

    #[instrument(skip(self, candidate))]
    pub async fn update(&self, id: Uuid, candidate: NewMosRecord) -> Result<MosRecord, ServiceError> {
        candidate.validate()?;

        let record = self
            .records
            .write()
            .await
            .update(id, |record| record.apply_edit(candidate))?
            .clone();

        self.event_sender
            .send_or_log(Event::MosRecordUpdated(record.id))
            .await;
        Ok(record)
    }

    pub async fn increment_quantity(&self, id: Uuid) -> Result<MosRecord, ServiceError> {
        Ok(self.records.write().await.increment_quantity(id)?.clone())
    }

    pub async fn decrement_quantity(&self, id: Uuid) -> Result<MosRecord, ServiceError> {
        Ok(self.records.write().await.decrement_quantity(id)?.clone())
    }

    #[instrument(skip(self))]
    pub async fn clear(&self) -> usize {
        let removed = self.records.write().await.clear();
        warn!(removed, "MOS records cleared");
        self.event_sender
            .send_or_log(Event::MosCleared { removed })
            .await;
        removed
    }

    pub async fn export(&self, date: NaiveDate) -> CsvExport {
        let repo = self.records.read().await;
        CsvExport {
            filename: mos_csv::export_filename(date),
            content_type: CSV_CONTENT_TYPE,
            body: mos_csv::serialize(repo.list()),
        }
    }

    pub async fn export_today(&self) -> CsvExport {
        self.export(Utc::now().date_naive()).await
    }
}
