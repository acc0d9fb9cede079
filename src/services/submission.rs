//! Form-session state machine for receiving submissions.
//!
//! A submission moves `Idle -> Validating -> Committed`. Any failure drops the
//! session back to `Idle` without touching the repository.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{non_blank, InventoryRecord, NewInventoryRecord};
use crate::repositories::InventoryRepository;
use crate::services::duplicates::{find_duplicate, DuplicatePolicy};
use crate::services::photos::PhotoCapture;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Validating,
    Committed,
}

/// Whether a submission adds a record or rewrites an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "id")]
pub enum SubmitMode {
    Create,
    Edit(Uuid),
}

/// Raw receiving form as entered by the associate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingForm {
    #[serde(default)]
    pub store_location: String,
    #[serde(default)]
    pub sap_number: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Inline photo to persist before the record is committed
    #[serde(default)]
    pub photo: Option<PhotoCapture>,
}

/// A form that passed field validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub candidate: NewInventoryRecord,
    pub bol_number: String,
    pub capture: Option<PhotoCapture>,
    pub mode: SubmitMode,
    /// Existing record the candidate collides with, when the policy let it through
    pub duplicate_of: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub record: InventoryRecord,
    pub mode: SubmitMode,
    /// The caller should clear its form; false after an edit
    pub form_reset: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<Uuid>,
}

#[derive(Debug)]
pub struct SubmissionCoordinator {
    state: SubmissionState,
    photo_required: bool,
    policy: DuplicatePolicy,
}

impl SubmissionCoordinator {
    pub fn new(policy: DuplicatePolicy, photo_required: bool) -> Self {
        Self {
            state: SubmissionState::Idle,
            photo_required,
            policy,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Runs every check that does not need I/O.
    ///
    /// Field validation, edit target existence and, for creates, duplicate
    /// detection under the configured policy.
    pub fn prepare(
        &mut self,
        repo: &InventoryRepository,
        form: ReceivingForm,
        mode: SubmitMode,
        bol_number: Option<&str>,
    ) -> Result<ValidatedSubmission, ServiceError> {
        self.state = SubmissionState::Validating;
        let result = self.check(repo, form, mode, bol_number);
        if result.is_err() {
            self.state = SubmissionState::Idle;
        }
        result
    }

    /// Writes a prepared submission into the repository.
    pub fn commit(
        &mut self,
        repo: &mut InventoryRepository,
        submission: ValidatedSubmission,
    ) -> Result<SubmissionOutcome, ServiceError> {
        if self.state != SubmissionState::Validating {
            return Err(ServiceError::Conflict(format!(
                "submission is {:?}, expected Validating",
                self.state
            )));
        }

        let ValidatedSubmission {
            candidate,
            bol_number,
            mode,
            duplicate_of,
            ..
        } = submission;

        let result = match mode {
            SubmitMode::Create => repo
                .insert(InventoryRecord::create(candidate, &bol_number))
                .map(|record| SubmissionOutcome {
                    record: record.clone(),
                    mode,
                    form_reset: true,
                    duplicate_of,
                }),
            SubmitMode::Edit(id) => repo
                .update(id, |record| record.apply_edit(candidate, &bol_number))
                .map(|record| SubmissionOutcome {
                    record: record.clone(),
                    mode,
                    form_reset: false,
                    duplicate_of: None,
                }),
        };

        self.state = if result.is_ok() {
            SubmissionState::Committed
        } else {
            SubmissionState::Idle
        };
        result
    }

    /// Drops a prepared submission, for example when its photo upload failed.
    pub fn abort(&mut self) {
        self.state = SubmissionState::Idle;
    }

    /// Validates and commits in one step. The form must not carry an inline
    /// photo; those go through the receiving service.
    pub fn submit(
        &mut self,
        repo: &mut InventoryRepository,
        form: ReceivingForm,
        mode: SubmitMode,
        bol_number: Option<&str>,
    ) -> Result<SubmissionOutcome, ServiceError> {
        if form.photo.is_some() {
            return Err(ServiceError::BadRequest(
                "inline photos must be persisted before commit".into(),
            ));
        }
        let submission = self.prepare(repo, form, mode, bol_number)?;
        self.commit(repo, submission)
    }

    fn check(
        &self,
        repo: &InventoryRepository,
        form: ReceivingForm,
        mode: SubmitMode,
        bol_number: Option<&str>,
    ) -> Result<ValidatedSubmission, ServiceError> {
        let store_location = non_blank(Some(form.store_location.as_str()));
        let sap_number = non_blank(Some(form.sap_number.as_str()));
        let barcode = non_blank(form.barcode.as_deref());
        let photo_url = non_blank(form.photo_url.as_deref());
        let bol_number = non_blank(bol_number);

        let mut missing = Vec::new();
        if store_location.is_none() {
            missing.push("store location");
        }
        if sap_number.is_none() {
            missing.push("SAP number");
        }
        if barcode.is_none() {
            missing.push("barcode");
        }
        if self.photo_required && photo_url.is_none() && form.photo.is_none() {
            missing.push("photo");
        }
        if !missing.is_empty() {
            debug!(?missing, "submission missing required fields");
            return Err(ServiceError::ValidationError(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        let bol_number = bol_number.ok_or_else(|| {
            ServiceError::ValidationError("Batch BOL number must be set before receiving".into())
        })?;

        let candidate = NewInventoryRecord {
            store_location: store_location.unwrap_or_default(),
            sap_number: sap_number.unwrap_or_default(),
            quantity: form.quantity.unwrap_or(1),
            barcode,
            photo_url,
        };

        let duplicate_of = match mode {
            SubmitMode::Edit(id) => {
                if repo.get(id).is_none() {
                    return Err(ServiceError::NotFound(format!(
                        "Inventory record {} not found",
                        id
                    )));
                }
                None
            }
            SubmitMode::Create => match find_duplicate(&candidate, repo.list()) {
                None => None,
                Some(existing) => match self.policy {
                    DuplicatePolicy::Reject => {
                        return Err(ServiceError::DuplicateWarning(format!(
                            "SAP {} with barcode {} was already received",
                            candidate.sap_number,
                            candidate.barcode.as_deref().unwrap_or("(none)")
                        )));
                    }
                    DuplicatePolicy::Warn => {
                        warn!(
                            existing_id = %existing.id,
                            sap_number = %candidate.sap_number,
                            "accepting possible duplicate"
                        );
                        Some(existing.id)
                    }
                },
            },
        };

        Ok(ValidatedSubmission {
            candidate,
            bol_number,
            capture: form.photo,
            mode,
            duplicate_of,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn form(sap: &str, barcode: &str) -> ReceivingForm {
        ReceivingForm {
            store_location: "Store 118".into(),
            sap_number: sap.into(),
            quantity: Some(2),
            barcode: Some(barcode.into()),
            ..Default::default()
        }
    }

    fn coordinator() -> SubmissionCoordinator {
        SubmissionCoordinator::new(DuplicatePolicy::Reject, false)
    }

    #[test]
    fn create_prepends_and_resets_form() {
        let mut repo = InventoryRepository::new();
        let mut coord = coordinator();

        let outcome = coord
            .submit(&mut repo, form("100", "ABC"), SubmitMode::Create, Some("BOL-9"))
            .unwrap();

        assert_eq!(coord.state(), SubmissionState::Committed);
        assert!(outcome.form_reset);
        assert_eq!(outcome.record.bol_number, "BOL-9");
        assert_eq!(repo.list()[0].id, outcome.record.id);
    }

    #[test]
    fn missing_fields_leave_repository_untouched() {
        let mut repo = InventoryRepository::new();
        let mut coord = coordinator();
        let blank = ReceivingForm {
            store_location: "   ".into(),
            ..form("100", "ABC")
        };

        let err = coord
            .submit(&mut repo, blank, SubmitMode::Create, Some("BOL-1"))
            .unwrap_err();

        assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("store location"));
        assert_eq!(coord.state(), SubmissionState::Idle);
        assert!(repo.is_empty());
    }

    #[test]
    fn every_missing_field_is_named() {
        let repo = InventoryRepository::new();
        let mut coord = SubmissionCoordinator::new(DuplicatePolicy::Reject, true);

        let err = coord
            .prepare(&repo, ReceivingForm::default(), SubmitMode::Create, Some("BOL-1"))
            .unwrap_err();

        assert_matches!(
            err,
            ServiceError::ValidationError(ref msg)
                if msg == "Missing required fields: store location, SAP number, barcode, photo"
        );
    }

    #[test]
    fn unset_batch_is_rejected() {
        let mut repo = InventoryRepository::new();
        let err = coordinator()
            .submit(&mut repo, form("100", "ABC"), SubmitMode::Create, Some("  "))
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
        assert!(repo.is_empty());
    }

    #[test]
    fn photo_requirement_is_met_by_url_or_capture() {
        let repo = InventoryRepository::new();
        let mut coord = SubmissionCoordinator::new(DuplicatePolicy::Reject, true);

        let with_url = ReceivingForm {
            photo_url: Some("https://floor.example/p/abc123".into()),
            ..form("100", "ABC")
        };
        assert!(coord
            .prepare(&repo, with_url, SubmitMode::Create, Some("BOL-1"))
            .is_ok());

        let with_capture = ReceivingForm {
            photo: Some(PhotoCapture {
                data_base64: "aGVsbG8=".into(),
                content_type: "image/jpeg".into(),
            }),
            ..form("100", "ABC")
        };
        let prepared = coord
            .prepare(&repo, with_capture, SubmitMode::Create, Some("BOL-1"))
            .unwrap();
        assert!(prepared.capture.is_some());
    }

    #[test]
    fn duplicate_is_rejected_by_default() {
        let mut repo = InventoryRepository::new();
        coordinator()
            .submit(&mut repo, form("100", "ABC"), SubmitMode::Create, Some("BOL-1"))
            .unwrap();

        let mut coord = coordinator();
        let err = coord
            .submit(&mut repo, form("100", "ABC"), SubmitMode::Create, Some("BOL-1"))
            .unwrap_err();

        assert!(err.is_duplicate_warning());
        assert_eq!(coord.state(), SubmissionState::Idle);
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn warn_policy_inserts_and_flags() {
        let mut repo = InventoryRepository::new();
        let first = coordinator()
            .submit(&mut repo, form("100", "ABC"), SubmitMode::Create, Some("BOL-1"))
            .unwrap();

        let outcome = SubmissionCoordinator::new(DuplicatePolicy::Warn, false)
            .submit(&mut repo, form("100", "ABC"), SubmitMode::Create, Some("BOL-1"))
            .unwrap();

        assert_eq!(outcome.duplicate_of, Some(first.record.id));
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn edit_preserves_identity_and_keeps_form() {
        let mut repo = InventoryRepository::new();
        let created = coordinator()
            .submit(&mut repo, form("100", "ABC"), SubmitMode::Create, Some("BOL-1"))
            .unwrap()
            .record;

        // resubmitting the same values must not flag the record against itself
        let outcome = coordinator()
            .submit(
                &mut repo,
                ReceivingForm {
                    quantity: Some(7),
                    ..form("100", "ABC")
                },
                SubmitMode::Edit(created.id),
                Some("BOL-2"),
            )
            .unwrap();

        assert!(!outcome.form_reset);
        assert_eq!(outcome.record.id, created.id);
        assert_eq!(outcome.record.timestamp, created.timestamp);
        assert_eq!(outcome.record.quantity, 7);
        assert_eq!(outcome.record.bol_number, "BOL-2");
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn edit_of_unknown_record_is_not_found() {
        let mut repo = InventoryRepository::new();
        let err = coordinator()
            .submit(
                &mut repo,
                form("100", "ABC"),
                SubmitMode::Edit(Uuid::new_v4()),
                Some("BOL-1"),
            )
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[test]
    fn commit_requires_prepared_submission() {
        let mut repo = InventoryRepository::new();
        let prepared = coordinator()
            .prepare(&repo, form("100", "ABC"), SubmitMode::Create, Some("BOL-1"))
            .unwrap();

        let mut idle = coordinator();
        assert_matches!(
            idle.commit(&mut repo, prepared),
            Err(ServiceError::Conflict(_))
        );
        assert!(repo.is_empty());
    }

    #[test]
    fn quantity_defaults_to_one_and_values_are_trimmed() {
        let mut repo = InventoryRepository::new();
        let outcome = coordinator()
            .submit(
                &mut repo,
                ReceivingForm {
                    store_location: " Store 7 ".into(),
                    sap_number: " 555 ".into(),
                    quantity: None,
                    barcode: Some(" XYZ ".into()),
                    photo_url: Some("   ".into()),
                    photo: None,
                },
                SubmitMode::Create,
                Some(" BOL-3 "),
            )
            .unwrap();

        let record = outcome.record;
        assert_eq!(record.quantity, 1);
        assert_eq!(record.store_location, "Store 7");
        assert_eq!(record.sap_number, "555");
        assert_eq!(record.barcode.as_deref(), Some("XYZ"));
        assert_eq!(record.photo_url, None);
        assert_eq!(record.bol_number, "BOL-3");
    }
}
