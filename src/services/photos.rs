use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

const SHORT_ID_ATTEMPTS: usize = 5;

/// A photo taken on the receiving form, still inline in the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoCapture {
    /// Base64 payload; a `data:<type>;base64,` prefix is accepted
    pub data_base64: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "image/jpeg".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    pub short_id: String,
    pub path: String,
    pub target_url: String,
    pub created_at: DateTime<Utc>,
}

/// Result of persisting a capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredPhoto {
    pub short_id: String,
    pub short_url: String,
    pub path: String,
    pub object_url: String,
}

/// Blob storage for photo bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `object` at `path` and returns its public URL.
    async fn put(&self, path: &str, object: StoredObject) -> Result<String, ServiceError>;

    async fn get(&self, path: &str) -> Result<Option<StoredObject>, ServiceError>;

    async fn delete(&self, path: &str) -> Result<(), ServiceError>;
}

/// Short id to object mappings.
#[async_trait]
pub trait ShortLinkStore: Send + Sync {
    /// Fails with `Conflict` when `link.short_id` is already taken.
    async fn create_mapping(&self, link: ShortLink) -> Result<(), ServiceError>;

    async fn fetch(&self, short_id: &str) -> Result<Option<ShortLink>, ServiceError>;

    /// Removes every mapping pointing at `path`, returning how many went.
    async fn delete_by_path(&self, path: &str) -> Result<usize, ServiceError>;
}

/// Object store kept in process memory, serving objects under `{base_url}/{path}`.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    base_url: String,
    objects: DashMap<String, StoredObject>,
}

impl InMemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, path: &str, object: StoredObject) -> Result<String, ServiceError> {
        self.objects.insert(path.to_string(), object);
        Ok(format!("{}/{}", self.base_url, path))
    }

    async fn get(&self, path: &str) -> Result<Option<StoredObject>, ServiceError> {
        Ok(self.objects.get(path).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, path: &str) -> Result<(), ServiceError> {
        self.objects.remove(path);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryShortLinkStore {
    links: DashMap<String, ShortLink>,
}

impl InMemoryShortLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[async_trait]
impl ShortLinkStore for InMemoryShortLinkStore {
    async fn create_mapping(&self, link: ShortLink) -> Result<(), ServiceError> {
        use dashmap::mapref::entry::Entry;

        match self.links.entry(link.short_id.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "short id {} already in use",
                link.short_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(link);
                Ok(())
            }
        }
    }

    async fn fetch(&self, short_id: &str) -> Result<Option<ShortLink>, ServiceError> {
        Ok(self.links.get(short_id).map(|entry| entry.value().clone()))
    }

    async fn delete_by_path(&self, path: &str) -> Result<usize, ServiceError> {
        let before = self.links.len();
        self.links.retain(|_, link| link.path != path);
        Ok(before.saturating_sub(self.links.len()))
    }
}

/// Uploads captures and hands out short links, all or nothing.
#[derive(Clone)]
pub struct PhotoService {
    objects: Arc<dyn ObjectStore>,
    links: Arc<dyn ShortLinkStore>,
    short_link_base_url: String,
    short_id_length: usize,
    event_sender: EventSender,
}

impl PhotoService {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        links: Arc<dyn ShortLinkStore>,
        short_link_base_url: impl Into<String>,
        short_id_length: usize,
        event_sender: EventSender,
    ) -> Self {
        Self {
            objects,
            links,
            short_link_base_url: short_link_base_url.into().trim_end_matches('/').to_string(),
            short_id_length,
            event_sender,
        }
    }

    pub fn short_url(&self, short_id: &str) -> String {
        format!("{}/p/{}", self.short_link_base_url, short_id)
    }

    /// Stores the capture and creates its short link.
    ///
    /// On any failure the uploaded object is removed again and the error is
    /// reported as `PersistenceError`.
    #[instrument(skip(self, capture), fields(content_type = %capture.content_type))]
    pub async fn store(
        &self,
        capture: &PhotoCapture,
        sap_number: &str,
    ) -> Result<StoredPhoto, ServiceError> {
        let object = decode_capture(capture)?;
        let path = object_path(sap_number, &object.content_type);

        let object_url = self
            .objects
            .put(&path, object)
            .await
            .map_err(as_persistence_error)?;

        let short_id = match self.create_link(&path, &object_url).await {
            Ok(short_id) => short_id,
            Err(e) => {
                error!(path = %path, error = %e, "short link creation failed, removing upload");
                self.remove_object(&path).await;
                return Err(as_persistence_error(e));
            }
        };

        info!(short_id = %short_id, path = %path, "photo persisted");
        self.event_sender
            .send_or_log(Event::PhotoStored {
                short_id: short_id.clone(),
                path: path.clone(),
            })
            .await;

        Ok(StoredPhoto {
            short_url: self.short_url(&short_id),
            short_id,
            path,
            object_url,
        })
    }

    /// Undoes a [`store`](Self::store) whose record was never committed.
    #[instrument(skip(self, photo), fields(path = %photo.path))]
    pub async fn discard(&self, photo: &StoredPhoto) {
        if let Err(e) = self.links.delete_by_path(&photo.path).await {
            warn!(error = %e, "failed to delete short link");
        }
        self.remove_object(&photo.path).await;
    }

    /// Deletes the photo behind one of this service's short URLs.
    ///
    /// URLs minted elsewhere and unknown short ids are left alone.
    #[instrument(skip(self))]
    pub async fn release(&self, short_url: &str) {
        let prefix = format!("{}/p/", self.short_link_base_url);
        let Some(short_id) = short_url.strip_prefix(&prefix) else {
            return;
        };

        match self.links.fetch(short_id).await {
            Ok(Some(link)) => {
                if let Err(e) = self.links.delete_by_path(&link.path).await {
                    warn!(error = %e, "failed to delete short link");
                }
                self.remove_object(&link.path).await;
                info!(short_id = %short_id, path = %link.path, "superseded photo released");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to look up superseded photo"),
        }
    }

    /// Target URL behind a short id.
    pub async fn resolve(&self, short_id: &str) -> Result<String, ServiceError> {
        self.links
            .fetch(short_id)
            .await?
            .map(|link| link.target_url)
            .ok_or_else(|| ServiceError::NotFound(format!("Photo link {} not found", short_id)))
    }

    pub async fn object(&self, path: &str) -> Result<StoredObject, ServiceError> {
        self.objects
            .get(path)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Photo {} not found", path)))
    }

    async fn create_link(&self, path: &str, object_url: &str) -> Result<String, ServiceError> {
        let mut last_err = None;
        for _ in 0..SHORT_ID_ATTEMPTS {
            let short_id = generate_short_id(self.short_id_length);
            let link = ShortLink {
                short_id: short_id.clone(),
                path: path.to_string(),
                target_url: object_url.to_string(),
                created_at: Utc::now(),
            };
            match self.links.create_mapping(link).await {
                Ok(()) => return Ok(short_id),
                Err(ServiceError::Conflict(msg)) => {
                    warn!(short_id = %short_id, "short id collision, retrying");
                    last_err = Some(ServiceError::Conflict(msg));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| ServiceError::InternalError("no short id attempts made".into())))
    }

    async fn remove_object(&self, path: &str) {
        if let Err(e) = self.objects.delete(path).await {
            warn!(path = %path, error = %e, "failed to remove stored photo");
        }
    }
}

pub fn generate_short_id(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn decode_capture(capture: &PhotoCapture) -> Result<StoredObject, ServiceError> {
    let (content_type, payload) = match capture.data_base64.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => {
            (prefix.trim_start_matches("data:").to_string(), data)
        }
        _ => (capture.content_type.clone(), capture.data_base64.as_str()),
    };

    if !content_type.starts_with("image/") {
        return Err(ServiceError::ValidationError(format!(
            "Photo must be an image, got {}",
            content_type
        )));
    }

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ServiceError::ValidationError(format!("Photo is not valid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(ServiceError::ValidationError("Photo is empty".into()));
    }

    Ok(StoredObject {
        bytes,
        content_type,
    })
}

fn object_path(sap_number: &str, content_type: &str) -> String {
    let extension = match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    };
    let sap: String = sap_number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let sap = if sap.is_empty() { "item".to_string() } else { sap };
    format!(
        "photos/{}/{}-{}.{}",
        Utc::now().format("%Y-%m-%d"),
        sap,
        Uuid::new_v4().simple(),
        extension
    )
}

fn as_persistence_error(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::PersistenceError(_) => err,
        other => ServiceError::PersistenceError(other.to_string()),
    }
}
