use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{clamp_quantity, generate_id, Record};

/// Longest markout code accepted.
pub const MAX_MOS_CODE_LEN: usize = 5;

/// Where marked-out merchandise went.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MosReason {
    #[serde(rename = "to bins")]
    ToBins,
    #[serde(rename = "trash")]
    Trash,
}

impl MosReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MosReason::ToBins => "to bins",
            MosReason::Trash => "trash",
        }
    }
}

impl fmt::Display for MosReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MosReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "to bins" => Ok(MosReason::ToBins),
            "trash" => Ok(MosReason::Trash),
            other => Err(format!("unknown MOS reason '{}'", other)),
        }
    }
}

/// A markout/shrink removal entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosRecord {
    pub id: Uuid,
    pub code: String,
    pub quantity: u32,
    pub reason: MosReason,
    pub store_location: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewMosRecord {
    #[validate(custom = "validate_mos_code")]
    pub code: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    pub reason: MosReason,
    #[validate(custom = "validate_store_location")]
    pub store_location: String,
}

impl MosRecord {
    pub fn create(candidate: NewMosRecord) -> Self {
        Self {
            id: generate_id(),
            code: candidate.code.trim().to_string(),
            quantity: clamp_quantity(candidate.quantity),
            reason: candidate.reason,
            store_location: candidate.store_location.trim().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Replaces every mutable field. `id` and `timestamp` are kept.
    pub fn apply_edit(&mut self, candidate: NewMosRecord) {
        self.code = candidate.code.trim().to_string();
        self.quantity = clamp_quantity(candidate.quantity);
        self.reason = candidate.reason;
        self.store_location = candidate.store_location.trim().to_string();
    }
}

impl Record for MosRecord {
    const KIND: &'static str = "MOS record";

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

/// Codes are one to five ASCII digits.
pub fn validate_mos_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.is_empty() || code.len() > MAX_MOS_CODE_LEN || !code.chars().all(|c| c.is_ascii_digit())
    {
        let mut err = ValidationError::new("mos_code");
        err.message = Some("MOS code must be 1 to 5 digits".into());
        return Err(err);
    }
    Ok(())
}

fn validate_store_location(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("Store location is required".into());
        return Err(err);
    }
    Ok(())
}
