pub mod common;
pub mod inventory;
pub mod mos;
pub mod photos;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::photos::{
    InMemoryObjectStore, InMemoryShortLinkStore, ObjectStore, ShortLinkStore,
};
use crate::services::{MosService, PhotoService, ReceivingService, ReceivingSettings};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub receiving: ReceivingService,
    pub mos: MosService,
    pub photos: PhotoService,
}

impl AppServices {
    /// Build services backed by in-process photo storage.
    pub fn new(config: &AppConfig, event_sender: EventSender) -> Self {
        let objects: Arc<dyn ObjectStore> =
            Arc::new(InMemoryObjectStore::new(config.public_base_url()));
        let links: Arc<dyn ShortLinkStore> = Arc::new(InMemoryShortLinkStore::new());
        Self::with_photo_stores(config, event_sender, objects, links)
    }

    /// Build services on top of caller-supplied photo storage.
    pub fn with_photo_stores(
        config: &AppConfig,
        event_sender: EventSender,
        objects: Arc<dyn ObjectStore>,
        links: Arc<dyn ShortLinkStore>,
    ) -> Self {
        let photos = PhotoService::new(
            objects,
            links,
            config.public_base_url(),
            config.short_id_length,
            event_sender.clone(),
        );
        let receiving = ReceivingService::new(
            photos.clone(),
            ReceivingSettings {
                duplicate_policy: config.duplicate_policy,
                photo_required: config.photo_required,
            },
            event_sender.clone(),
        );
        let mos = MosService::new(event_sender);

        Self {
            receiving,
            mos,
            photos,
        }
    }
}
