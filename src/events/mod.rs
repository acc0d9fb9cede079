use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    ///
    /// Domain operations have already committed when events are emitted.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Things that happened to the receiving and MOS collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BatchStarted {
        bol_number: String,
    },
    InventoryRecordCreated {
        record_id: Uuid,
        bol_number: String,
        sap_number: String,
        timestamp: DateTime<Utc>,
    },
    InventoryRecordUpdated {
        record_id: Uuid,
        bol_number: String,
    },
    InventoryQuantityChanged {
        record_id: Uuid,
        quantity: u32,
    },
    DuplicateDetected {
        sap_number: String,
        barcode: Option<String>,
        existing_id: Uuid,
    },
    InventoryCleared {
        removed: usize,
    },
    InventoryImported {
        imported: usize,
        skipped: usize,
    },
    PhotoStored {
        short_id: String,
        path: String,
    },
    MosRecordCreated(Uuid),
    MosRecordUpdated(Uuid),
    MosCleared {
        removed: usize,
    },
}

/// Drains the event channel, logging each event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::BatchStarted { bol_number } => {
                info!(bol_number = %bol_number, "receiving batch started");
            }
            Event::InventoryRecordCreated {
                record_id,
                bol_number,
                sap_number,
                timestamp,
            } => {
                info!(
                    record_id = %record_id,
                    bol_number = %bol_number,
                    sap_number = %sap_number,
                    timestamp = %timestamp,
                    "inventory record created"
                );
            }
            Event::InventoryRecordUpdated {
                record_id,
                bol_number,
            } => {
                info!(record_id = %record_id, bol_number = %bol_number, "inventory record updated");
            }
            Event::InventoryQuantityChanged { record_id, quantity } => {
                info!(record_id = %record_id, quantity, "inventory quantity changed");
            }
            Event::DuplicateDetected {
                sap_number,
                barcode,
                existing_id,
            } => {
                warn!(
                    sap_number = %sap_number,
                    barcode = ?barcode,
                    existing_id = %existing_id,
                    "possible duplicate accepted into inventory"
                );
            }
            Event::InventoryCleared { removed } => {
                warn!(removed, "inventory collection cleared");
            }
            Event::InventoryImported { imported, skipped } => {
                info!(imported, skipped, "inventory report imported");
            }
            Event::PhotoStored { short_id, path } => {
                info!(short_id = %short_id, path = %path, "photo stored");
            }
            Event::MosRecordCreated(id) => {
                info!(record_id = %id, "MOS record created");
            }
            Event::MosRecordUpdated(id) => {
                info!(record_id = %id, "MOS record updated");
            }
            Event::MosCleared { removed } => {
                warn!(removed, "MOS collection cleared");
            }
        }
    }

    warn!("Event processing loop has ended");
}
