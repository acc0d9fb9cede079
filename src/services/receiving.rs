use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{non_blank, InventoryRecord};
use crate::reports::{self, CSV_CONTENT_TYPE};
use crate::repositories::InventoryRepository;
use crate::services::duplicates::DuplicatePolicy;
use crate::services::photos::PhotoService;
use crate::services::submission::{
    ReceivingForm, SubmissionCoordinator, SubmissionOutcome, SubmitMode,
};

/// Knobs the receiving workflow reads from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceivingSettings {
    pub duplicate_policy: DuplicatePolicy,
    pub photo_required: bool,
}

/// A rendered CSV report ready to download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Service owning the inventory collection and the current receiving batch
#[derive(Clone)]
pub struct ReceivingService {
    inventory: Arc<RwLock<InventoryRepository>>,
    batch: Arc<RwLock<Option<String>>>,
    pending: Arc<Mutex<()>>,
    photos: PhotoService,
    settings: ReceivingSettings,
    event_sender: EventSender,
}

impl ReceivingService {
    pub fn new(photos: PhotoService, settings: ReceivingSettings, event_sender: EventSender) -> Self {
        Self {
            inventory: Arc::new(RwLock::new(InventoryRepository::new())),
            batch: Arc::new(RwLock::new(None)),
            pending: Arc::new(Mutex::new(())),
            photos,
            settings,
            event_sender,
        }
    }

    pub fn settings(&self) -> ReceivingSettings {
        self.settings
    }

    /// Sets the BOL number stamped on every record submitted from now on.
    #[instrument(skip(self))]
    pub async fn start_batch(&self, bol_number: &str) -> Result<String, ServiceError> {
        let bol_number = non_blank(Some(bol_number)).ok_or_else(|| {
            ServiceError::ValidationError("BOL number is required".into())
        })?;

        *self.batch.write().await = Some(bol_number.clone());
        info!(bol_number = %bol_number, "receiving batch started");
        self.event_sender
            .send_or_log(Event::BatchStarted {
                bol_number: bol_number.clone(),
            })
            .await;
        Ok(bol_number)
    }

    pub async fn current_batch(&self) -> Option<String> {
        self.batch.read().await.clone()
    }

    /// Records newest first.
    pub async fn list(&self) -> Vec<InventoryRecord> {
        self.inventory.read().await.list().to_vec()
    }

    pub async fn get(&self, id: Uuid) -> Result<InventoryRecord, ServiceError> {
        self.inventory
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory record {} not found", id)))
    }

    /// Runs a form through the submission coordinator.
    ///
    /// An inline photo is persisted before anything is written; if the record
    /// then cannot be committed the photo is discarded again. An edit that
    /// uploads a new photo releases the one it replaces.
    #[instrument(skip(self, form), fields(sap_number = %form.sap_number))]
    pub async fn submit(
        &self,
        form: ReceivingForm,
        mode: SubmitMode,
    ) -> Result<SubmissionOutcome, ServiceError> {
        let _pending = self.begin_pending("A submission")?;
        let bol_number = self.current_batch().await;
        let mut coordinator = SubmissionCoordinator::new(
            self.settings.duplicate_policy,
            self.settings.photo_required,
        );

        let mut submission = {
            let repo = self.inventory.read().await;
            coordinator.prepare(&repo, form, mode, bol_number.as_deref())?
        };

        let stored_photo = match submission.capture.take() {
            Some(capture) => {
                match self
                    .photos
                    .store(&capture, &submission.candidate.sap_number)
                    .await
                {
                    Ok(stored) => {
                        submission.candidate.photo_url = Some(stored.short_url.clone());
                        Some(stored)
                    }
                    Err(e) => {
                        coordinator.abort();
                        error!(error = %e, "photo persistence failed, submission aborted");
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        let duplicate_of = submission.duplicate_of;
        let sap_number = submission.candidate.sap_number.clone();
        let barcode = submission.candidate.barcode.clone();

        let (committed, previous_photo) = {
            let mut repo = self.inventory.write().await;
            let previous_photo = match (mode, &stored_photo) {
                (SubmitMode::Edit(id), Some(_)) => repo.get(id).and_then(|r| r.photo_url.clone()),
                _ => None,
            };
            (coordinator.commit(&mut repo, submission), previous_photo)
        };

        let outcome = match committed {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(stored) = &stored_photo {
                    self.photos.discard(stored).await;
                }
                return Err(e);
            }
        };

        if let Some(previous) = previous_photo {
            if outcome.record.photo_url.as_deref() != Some(previous.as_str()) {
                self.photos.release(&previous).await;
            }
        }

        if let Some(existing_id) = duplicate_of {
            self.event_sender
                .send_or_log(Event::DuplicateDetected {
                    sap_number,
                    barcode,
                    existing_id,
                })
                .await;
        }

        let record = &outcome.record;
        let event = match mode {
            SubmitMode::Create => Event::InventoryRecordCreated {
                record_id: record.id,
                bol_number: record.bol_number.clone(),
                sap_number: record.sap_number.clone(),
                timestamp: record.timestamp,
            },
            SubmitMode::Edit(_) => Event::InventoryRecordUpdated {
                record_id: record.id,
                bol_number: record.bol_number.clone(),
            },
        };
        self.event_sender.send_or_log(event).await;

        info!(record_id = %record.id, form_reset = outcome.form_reset, "submission committed");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn increment_quantity(&self, id: Uuid) -> Result<InventoryRecord, ServiceError> {
        let record = self.inventory.write().await.increment_quantity(id)?.clone();
        self.quantity_changed(&record).await;
        Ok(record)
    }

    /// Never drops below one.
    #[instrument(skip(self))]
    pub async fn decrement_quantity(&self, id: Uuid) -> Result<InventoryRecord, ServiceError> {
        let record = self.inventory.write().await.decrement_quantity(id)?.clone();
        self.quantity_changed(&record).await;
        Ok(record)
    }

    /// Empties the collection.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> usize {
        let removed = self.inventory.write().await.clear();
        warn!(removed, "inventory cleared");
        self.event_sender
            .send_or_log(Event::InventoryCleared { removed })
            .await;
        removed
    }

    /// Renders the collection as a CSV report dated `date`.
    pub async fn export(&self, date: NaiveDate, banner: Option<&str>) -> CsvExport {
        let repo = self.inventory.read().await;
        let body = match banner.and_then(|b| non_blank(Some(b))) {
            Some(banner) => reports::serialize_with_banner(repo.list(), &banner),
            None => reports::serialize(repo.list()),
        };
        CsvExport {
            filename: reports::export_filename(date),
            content_type: CSV_CONTENT_TYPE,
            body,
        }
    }

    pub async fn export_today(&self, banner: Option<&str>) -> CsvExport {
        self.export(Utc::now().date_naive(), banner).await
    }

    /// Replaces the whole collection with the records recovered from `text`.
    ///
    /// A report with no usable rows leaves the collection untouched.
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn import(&self, text: &str) -> Result<ImportSummary, ServiceError> {
        let _pending = self.begin_pending("An import")?;

        let report = reports::parse(text)?;
        let skipped = report.skipped;
        let imported = self.inventory.write().await.replace_all(report.records)?;

        info!(imported, skipped, "inventory replaced from report");
        self.event_sender
            .send_or_log(Event::InventoryImported { imported, skipped })
            .await;
        Ok(ImportSummary { imported, skipped })
    }

    fn begin_pending(&self, what: &str) -> Result<MutexGuard<'_, ()>, ServiceError> {
        self.pending.try_lock().map_err(|_| {
            warn!("{} was refused while another operation is pending", what);
            ServiceError::Conflict(format!("{} is already in progress", what))
        })
    }

    async fn quantity_changed(&self, record: &InventoryRecord) {
        self.event_sender
            .send_or_log(Event::InventoryQuantityChanged {
                record_id: record.id,
                quantity: record.quantity,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::photos::{
        InMemoryObjectStore, InMemoryShortLinkStore, PhotoCapture, ShortLink, ShortLinkStore,
    };
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use base64::{engine::general_purpose, Engine as _};
    use std::sync::OnceLock;
    use tokio::sync::mpsc;

    /// Link table that is down.
    struct UnavailableLinks;

    #[async_trait]
    impl ShortLinkStore for UnavailableLinks {
        async fn create_mapping(&self, _link: ShortLink) -> Result<(), ServiceError> {
            Err(ServiceError::InternalError("link table unavailable".into()))
        }

        async fn fetch(&self, _short_id: &str) -> Result<Option<ShortLink>, ServiceError> {
            Ok(None)
        }

        async fn delete_by_path(&self, _path: &str) -> Result<usize, ServiceError> {
            Ok(0)
        }
    }

    /// Empties the inventory while a link is being minted, so the record an
    /// edit targets is gone by the time it commits.
    #[derive(Default)]
    struct ClearingLinks {
        inner: InMemoryShortLinkStore,
        inventory: OnceLock<Arc<RwLock<InventoryRepository>>>,
    }

    #[async_trait]
    impl ShortLinkStore for ClearingLinks {
        async fn create_mapping(&self, link: ShortLink) -> Result<(), ServiceError> {
            if let Some(inventory) = self.inventory.get() {
                inventory.write().await.clear();
            }
            self.inner.create_mapping(link).await
        }

        async fn fetch(&self, short_id: &str) -> Result<Option<ShortLink>, ServiceError> {
            self.inner.fetch(short_id).await
        }

        async fn delete_by_path(&self, path: &str) -> Result<usize, ServiceError> {
            self.inner.delete_by_path(path).await
        }
    }

    fn service_with_links(
        settings: ReceivingSettings,
        links: Arc<dyn ShortLinkStore>,
    ) -> (ReceivingService, Arc<InMemoryObjectStore>) {
        let (tx, _rx) = mpsc::channel(64);
        let events = EventSender::new(tx);
        let objects = Arc::new(InMemoryObjectStore::new("https://floor.example"));
        let photos = PhotoService::new(
            objects.clone(),
            links,
            "https://floor.example",
            6,
            events.clone(),
        );
        (ReceivingService::new(photos, settings, events), objects)
    }

    fn service_with(settings: ReceivingSettings) -> (ReceivingService, Arc<InMemoryObjectStore>) {
        service_with_links(settings, Arc::new(InMemoryShortLinkStore::new()))
    }

    fn jpeg(bytes: &[u8]) -> Option<PhotoCapture> {
        Some(PhotoCapture {
            data_base64: general_purpose::STANDARD.encode(bytes),
            content_type: "image/jpeg".into(),
        })
    }

    fn service() -> ReceivingService {
        service_with(ReceivingSettings::default()).0
    }

    fn form(sap: &str, barcode: &str) -> ReceivingForm {
        ReceivingForm {
            store_location: "Store 118".into(),
            sap_number: sap.into(),
            quantity: Some(3),
            barcode: Some(barcode.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn submit_requires_a_batch() {
        let svc = service();
        let err = svc.submit(form("1", "A"), SubmitMode::Create).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
        assert!(svc.list().await.is_empty());
    }

    #[tokio::test]
    async fn blank_batch_is_rejected() {
        let svc = service();
        assert_matches!(
            svc.start_batch("   ").await,
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(svc.current_batch().await, None);
    }

    #[tokio::test]
    async fn export_clear_import_round_trip() {
        let svc = service();
        svc.start_batch("BOL-42").await.unwrap();
        let original = svc
            .submit(form("12345", "ABC"), SubmitMode::Create)
            .await
            .unwrap()
            .record;

        let export = svc
            .export(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), None)
            .await;
        assert_eq!(export.filename, "inventory-report-3-5-2024.csv");

        assert_eq!(svc.clear().await, 1);
        let summary = svc.import(&export.body).await.unwrap();
        assert_eq!(summary, ImportSummary { imported: 1, skipped: 0 });

        let restored = svc.list().await;
        assert_eq!(restored.len(), 1);
        let record = &restored[0];
        assert_ne!(record.id, original.id);
        assert_eq!(record.store_location, original.store_location);
        assert_eq!(record.bol_number, "BOL-42");
        assert_eq!(record.sap_number, original.sap_number);
        assert_eq!(record.quantity, 3);
        assert_eq!(record.barcode, original.barcode);
        assert_eq!(record.photo_url, None);
    }

    #[tokio::test]
    async fn failed_import_keeps_collection() {
        let svc = service();
        svc.start_batch("BOL-1").await.unwrap();
        svc.submit(form("1", "A"), SubmitMode::Create).await.unwrap();

        let err = svc.import("a,b,c\n1,2,3").await.unwrap_err();
        assert_matches!(err, ServiceError::ImportParseError(_));
        assert_eq!(svc.list().await.len(), 1);
    }

    #[tokio::test]
    async fn banner_export_still_imports() {
        let svc = service();
        svc.start_batch("BOL-1").await.unwrap();
        svc.submit(form("1", "A"), SubmitMode::Create).await.unwrap();

        let export = svc.export_today(Some("Photos: https://floor.example/p")).await;
        assert!(export.body.starts_with("Photos: https://floor.example/p\n\n"));
        assert_eq!(svc.import(&export.body).await.unwrap().imported, 1);
    }

    #[tokio::test]
    async fn quantity_changes_clamp() {
        let svc = service();
        svc.start_batch("BOL-1").await.unwrap();
        let id = svc
            .submit(
                ReceivingForm {
                    quantity: Some(1),
                    ..form("1", "A")
                },
                SubmitMode::Create,
            )
            .await
            .unwrap()
            .record
            .id;

        assert_eq!(svc.decrement_quantity(id).await.unwrap().quantity, 1);
        assert_eq!(svc.increment_quantity(id).await.unwrap().quantity, 2);
        assert_matches!(
            svc.increment_quantity(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn pending_operation_blocks_a_second_one() {
        let svc = service();
        svc.start_batch("BOL-1").await.unwrap();

        let _held = svc.begin_pending("A submission").unwrap();
        let err = svc.submit(form("1", "A"), SubmitMode::Create).await.unwrap_err();
        assert_matches!(err, ServiceError::Conflict(ref msg) if msg.contains("already in progress"));
        assert_matches!(svc.import("x").await, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn inline_photo_becomes_short_link() {
        let (svc, objects) = service_with(ReceivingSettings {
            photo_required: true,
            ..Default::default()
        });
        svc.start_batch("BOL-1").await.unwrap();

        let outcome = svc
            .submit(
                ReceivingForm {
                    photo: Some(PhotoCapture {
                        data_base64: general_purpose::STANDARD.encode(b"jpeg bytes"),
                        content_type: "image/jpeg".into(),
                    }),
                    ..form("1", "A")
                },
                SubmitMode::Create,
            )
            .await
            .unwrap();

        let url = outcome.record.photo_url.unwrap();
        assert!(url.starts_with("https://floor.example/p/"));
        assert_eq!(objects.len(), 1);
    }

    #[tokio::test]
    async fn bad_photo_aborts_without_writing() {
        let (svc, objects) = service_with(ReceivingSettings::default());
        svc.start_batch("BOL-1").await.unwrap();

        let err = svc
            .submit(
                ReceivingForm {
                    photo: Some(PhotoCapture {
                        data_base64: "not base64!".into(),
                        content_type: "image/jpeg".into(),
                    }),
                    ..form("1", "A")
                },
                SubmitMode::Create,
            )
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::ValidationError(_));
        assert!(svc.list().await.is_empty());
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn unavailable_link_store_aborts_submission() {
        let (svc, objects) =
            service_with_links(ReceivingSettings::default(), Arc::new(UnavailableLinks));
        svc.start_batch("BOL-1").await.unwrap();

        let err = svc
            .submit(
                ReceivingForm {
                    photo: jpeg(b"jpeg bytes"),
                    ..form("1", "A")
                },
                SubmitMode::Create,
            )
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::PersistenceError(_));
        assert!(svc.list().await.is_empty());
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn failed_commit_discards_uploaded_photo() {
        let links = Arc::new(ClearingLinks::default());
        let (svc, objects) = service_with_links(ReceivingSettings::default(), links.clone());
        let _ = links.inventory.set(svc.inventory.clone());
        svc.start_batch("BOL-1").await.unwrap();
        let id = svc
            .submit(form("1", "A"), SubmitMode::Create)
            .await
            .unwrap()
            .record
            .id;

        let err = svc
            .submit(
                ReceivingForm {
                    photo: jpeg(b"jpeg bytes"),
                    ..form("1", "A")
                },
                SubmitMode::Edit(id),
            )
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::NotFound(_));
        assert!(svc.list().await.is_empty());
        assert!(objects.is_empty());
        assert!(links.inner.is_empty());
    }

    #[tokio::test]
    async fn replacing_a_photo_releases_the_old_one() {
        let (svc, objects) = service_with(ReceivingSettings::default());
        svc.start_batch("BOL-1").await.unwrap();

        let first = svc
            .submit(
                ReceivingForm {
                    photo: jpeg(b"first"),
                    ..form("1", "A")
                },
                SubmitMode::Create,
            )
            .await
            .unwrap()
            .record;
        let old_url = first.photo_url.clone().unwrap();

        let edited = svc
            .submit(
                ReceivingForm {
                    photo: jpeg(b"second"),
                    ..form("1", "A")
                },
                SubmitMode::Edit(first.id),
            )
            .await
            .unwrap()
            .record;

        let new_url = edited.photo_url.unwrap();
        assert_ne!(new_url, old_url);
        assert_eq!(objects.len(), 1);
        let old_id = old_url.rsplit('/').next().unwrap();
        assert_matches!(svc.photos.resolve(old_id).await, Err(ServiceError::NotFound(_)));
        let new_id = new_url.rsplit('/').next().unwrap();
        assert!(svc.photos.resolve(new_id).await.is_ok());
    }
}
