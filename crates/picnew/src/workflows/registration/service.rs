use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::config::AuditPolicy;

use super::domain::{
    Actor, ApplicantDetails, AuditAction, AuditLogEntry, DocumentUpload, LinkCode, LinkId,
    LinkStatus, ProgramId, Registration, RegistrationId, RegistrationLink, RegistrationRecord,
    RegistrationStatus, RequiredDocument, SubmissionToken, TraineeDocument, TrainingProgram,
};
use super::link::{validate_link, LinkRejection};
use super::notifier::{Notifier, RegistrationNotice};
use super::repository::{LinkUpdate, RegistrationStore, StoreError};

/// Payload of a public submission attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub code: String,
    #[serde(flatten)]
    pub applicant: ApplicantDetails,
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

/// The only fields echoed back to an anonymous submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub registration_id: RegistrationId,
    pub submission_token: SubmissionToken,
}

/// Public summary of a link returned by the validate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSummary {
    pub code: LinkCode,
    pub training_program: TrainingProgram,
    pub max_registrations: Option<u32>,
    pub current_registrations: u64,
    pub required_documents: Vec<RequiredDocument>,
}

/// Link plus its live registration count, for the admin detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDetail {
    pub link: RegistrationLink,
    pub current_registrations: u64,
}

/// Full registration record returned to a token-holding submitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationStatusView {
    pub registration: Registration,
    pub documents: Vec<TraineeDocument>,
    pub training_program: Option<TrainingProgram>,
}

/// Admin request to create a link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    pub training_program_id: ProgramId,
    #[serde(default)]
    pub max_registrations: Option<u32>,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
}

/// Admin request to update a link. Absent fields stay untouched; the
/// code is immutable and cannot appear here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLinkRequest {
    #[serde(default)]
    pub max_registrations: Option<u32>,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<LinkStatus>,
}

/// Error raised by the registration service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Link(#[from] LinkRejection),
    #[error("{0}")]
    Validation(String),
    #[error("registration is already {}", current.label())]
    Conflict { current: RegistrationStatus },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::CapacityExhausted => WorkflowError::Link(LinkRejection::CapacityReached),
            StoreError::StaleStatus { current } => WorkflowError::Conflict { current },
            other => WorkflowError::Store(other),
        }
    }
}

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn audit_entry(
    actor: &Actor,
    action: AuditAction,
    description: String,
    target_id: String,
) -> AuditLogEntry {
    AuditLogEntry {
        actor: actor.id().to_string(),
        action,
        description,
        target_id,
        created_at: Utc::now(),
    }
}

fn next_link_code() -> LinkCode {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    LinkCode(raw.chars().take(12).collect())
}

/// Service composing the link validator, store, notifier, and audit policy.
pub struct RegistrationService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    audit_policy: AuditPolicy,
}

impl<S, N> RegistrationService<S, N>
where
    S: RegistrationStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, audit_policy: AuditPolicy) -> Self {
        Self {
            store,
            notifier,
            audit_policy,
        }
    }

    /// Validate a link code and describe what a submission will need.
    pub fn validate_link(&self, code: &str) -> Result<LinkSummary, WorkflowError> {
        let link = self.store.find_link_by_code(&LinkCode(code.to_string()))?;
        let current = match &link {
            Some(link) => self.store.registration_count(&link.id)?,
            None => 0,
        };
        validate_link(link.as_ref(), Utc::now(), current)?;
        // validate_link has already rejected the None case.
        let link = link.ok_or(LinkRejection::NotFound)?;

        let training_program = self
            .store
            .fetch_program(&link.training_program_id)?
            .ok_or(StoreError::NotFound)?;
        let required_documents = self.store.required_documents(&link.training_program_id)?;

        Ok(LinkSummary {
            code: link.code,
            training_program,
            max_registrations: link.max_registrations,
            current_registrations: current,
            required_documents,
        })
    }

    /// Accept a public submission against a link code.
    ///
    /// The registration and its documents are persisted as one atomic
    /// unit; the store re-checks capacity inside that unit, so two
    /// concurrent submitters cannot both take the last slot.
    pub fn submit(&self, request: SubmissionRequest) -> Result<SubmissionReceipt, WorkflowError> {
        let SubmissionRequest {
            code,
            applicant,
            documents,
        } = request;

        let link = self.store.find_link_by_code(&LinkCode(code))?;
        let current = match &link {
            Some(link) => self.store.registration_count(&link.id)?,
            None => 0,
        };
        validate_link(link.as_ref(), Utc::now(), current)?;
        let link = link.ok_or(LinkRejection::NotFound)?;

        let now = Utc::now();
        let registration_id = RegistrationId(next_id("reg"));
        let registration = Registration {
            id: registration_id.clone(),
            registration_link_id: link.id.clone(),
            submission_token: SubmissionToken(Uuid::new_v4().to_string()),
            applicant,
            status: RegistrationStatus::Pending,
            rejection_reason: None,
            created_at: now,
        };
        let documents = documents
            .into_iter()
            .map(|upload| TraineeDocument {
                registration_id: registration_id.clone(),
                document_type_id: upload.document_type_id,
                file_name: upload.file_name,
                file_url: upload.file_url,
                uploaded_at: now,
            })
            .collect();

        let entry = audit_entry(
            &Actor::System,
            AuditAction::NewRegistration,
            format!(
                "New registration submitted by {}",
                registration.applicant.full_name
            ),
            registration_id.0.clone(),
        );
        let stored =
            self.store
                .insert_registration(&link, registration, documents, self.staged_audit(&entry))?;
        self.settle_audit(entry);

        self.dispatch_notice(RegistrationNotice::Received {
            email: stored.applicant.email.clone(),
            full_name: stored.applicant.full_name.clone(),
            link_code: link.code.0.clone(),
        });

        Ok(SubmissionReceipt {
            registration_id: stored.id,
            submission_token: stored.submission_token,
        })
    }

    /// Look up a registration by its submission token.
    pub fn status(&self, token: &str) -> Result<RegistrationStatusView, WorkflowError> {
        let record = self
            .store
            .find_registration_by_token(&SubmissionToken(token.to_string()))?
            .ok_or(StoreError::NotFound)?;
        self.record_view(record)
    }

    /// Fetch a registration by id for the admin review screen.
    pub fn registration_detail(
        &self,
        id: &RegistrationId,
    ) -> Result<RegistrationStatusView, WorkflowError> {
        let record = self.store.find_registration(id)?.ok_or(StoreError::NotFound)?;
        self.record_view(record)
    }

    fn record_view(
        &self,
        record: RegistrationRecord,
    ) -> Result<RegistrationStatusView, WorkflowError> {
        let training_program = self
            .store
            .find_link(&record.registration.registration_link_id)?
            .map(|link| self.store.fetch_program(&link.training_program_id))
            .transpose()?
            .flatten();

        Ok(RegistrationStatusView {
            registration: record.registration,
            documents: record.documents,
            training_program,
        })
    }

    /// Approve a pending registration. Only `PENDING` registrations can
    /// transition; anything else reports the current terminal status.
    pub fn approve(
        &self,
        id: &RegistrationId,
        actor: &Actor,
    ) -> Result<Registration, WorkflowError> {
        let record = self.store.find_registration(id)?.ok_or(StoreError::NotFound)?;
        let entry = audit_entry(
            actor,
            AuditAction::ApproveRegistration,
            format!(
                "Approved registration for {}",
                record.registration.applicant.full_name
            ),
            id.0.clone(),
        );

        let updated = self.store.transition_registration(
            id,
            RegistrationStatus::Pending,
            RegistrationStatus::Approved,
            None,
            self.staged_audit(&entry),
        )?;
        self.settle_audit(entry);

        let program_name = self
            .store
            .find_link(&updated.registration_link_id)
            .ok()
            .flatten()
            .and_then(|link| self.store.fetch_program(&link.training_program_id).ok())
            .flatten()
            .map(|program| program.name)
            .unwrap_or_default();

        self.dispatch_notice(RegistrationNotice::Approved {
            email: updated.applicant.email.clone(),
            full_name: updated.applicant.full_name.clone(),
            program_name,
        });

        Ok(updated)
    }

    /// Reject a pending registration with a mandatory reason.
    pub fn reject(
        &self,
        id: &RegistrationId,
        actor: &Actor,
        reason: &str,
    ) -> Result<Registration, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::Validation(
                "rejection reason is required".to_string(),
            ));
        }

        let record = self.store.find_registration(id)?.ok_or(StoreError::NotFound)?;
        let entry = audit_entry(
            actor,
            AuditAction::RejectRegistration,
            format!(
                "Rejected registration for {}",
                record.registration.applicant.full_name
            ),
            id.0.clone(),
        );

        let updated = self.store.transition_registration(
            id,
            RegistrationStatus::Pending,
            RegistrationStatus::Rejected,
            Some(reason.to_string()),
            self.staged_audit(&entry),
        )?;
        self.settle_audit(entry);

        self.dispatch_notice(RegistrationNotice::Rejected {
            email: updated.applicant.email.clone(),
            full_name: updated.applicant.full_name.clone(),
            reason: reason.to_string(),
        });

        Ok(updated)
    }

    /// Create a registration link for an existing training program.
    pub fn create_link(
        &self,
        request: CreateLinkRequest,
        actor: &Actor,
    ) -> Result<RegistrationLink, WorkflowError> {
        if let Some(max) = request.max_registrations {
            if max == 0 {
                return Err(WorkflowError::Validation(
                    "max_registrations must be a positive integer".to_string(),
                ));
            }
        }

        self.store
            .fetch_program(&request.training_program_id)?
            .ok_or(StoreError::NotFound)?;

        let link = RegistrationLink {
            id: LinkId(next_id("link")),
            code: next_link_code(),
            training_program_id: request.training_program_id,
            max_registrations: request.max_registrations,
            expired_at: request.expired_at,
            status: LinkStatus::Active,
            created_by: actor.id().to_string(),
            created_at: Utc::now(),
        };

        let entry = audit_entry(
            actor,
            AuditAction::CreateLink,
            format!("Created registration link {}", link.code.0),
            link.id.0.clone(),
        );
        let stored = self.store.insert_link(link, self.staged_audit(&entry))?;
        self.settle_audit(entry);

        Ok(stored)
    }

    /// Fetch a link with its live registration count.
    pub fn link_detail(&self, id: &LinkId) -> Result<LinkDetail, WorkflowError> {
        let link = self.store.find_link(id)?.ok_or(StoreError::NotFound)?;
        let current_registrations = self.store.registration_count(&link.id)?;
        Ok(LinkDetail {
            link,
            current_registrations,
        })
    }

    /// Apply a partial update to a link (cap, expiry, status).
    pub fn update_link(
        &self,
        id: &LinkId,
        request: UpdateLinkRequest,
        actor: &Actor,
    ) -> Result<RegistrationLink, WorkflowError> {
        if let Some(0) = request.max_registrations {
            return Err(WorkflowError::Validation(
                "max_registrations must be a positive integer".to_string(),
            ));
        }

        let current = self.store.find_link(id)?.ok_or(StoreError::NotFound)?;
        let entry = audit_entry(
            actor,
            AuditAction::UpdateLink,
            format!("Updated registration link {}", current.code.0),
            id.0.clone(),
        );

        let updated = self.store.update_link(
            id,
            LinkUpdate {
                max_registrations: request.max_registrations.map(Some),
                expired_at: request.expired_at.map(Some),
                status: request.status,
            },
            self.staged_audit(&entry),
        )?;
        self.settle_audit(entry);

        Ok(updated)
    }

    /// Delete a link. Refused while registrations reference it.
    pub fn delete_link(
        &self,
        id: &LinkId,
        actor: &Actor,
    ) -> Result<RegistrationLink, WorkflowError> {
        let current = self.store.find_link(id)?.ok_or(StoreError::NotFound)?;
        let entry = audit_entry(
            actor,
            AuditAction::DeleteLink,
            format!("Deleted registration link {}", current.code.0),
            id.0.clone(),
        );

        let deleted = self.store.delete_link(id, self.staged_audit(&entry))?;
        self.settle_audit(entry);

        Ok(deleted)
    }

    /// Export every registration under a link as CSV.
    pub fn export_registrations(&self, link: &LinkId) -> Result<String, WorkflowError> {
        self.store.find_link(link)?.ok_or(StoreError::NotFound)?;
        let records = self.store.registrations_for_link(link)?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "Nama Lengkap",
                "Email",
                "Nomor Telepon",
                "Status",
                "Bidang",
                "Kelas",
            ])
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        for record in &records {
            let registration = &record.registration;
            writer
                .write_record([
                    registration.applicant.full_name.as_str(),
                    registration.applicant.email.as_str(),
                    registration.applicant.phone_number.as_str(),
                    registration.status.label(),
                    registration.applicant.bidang.as_str(),
                    registration.applicant.training_class_id.as_str(),
                ])
                .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| StoreError::Unavailable(err.to_string()).into())
    }

    /// Under `Strict` the entry rides inside the store mutation, so a
    /// failed audit write rolls the whole operation back. Under
    /// `BestEffort` the mutation commits on its own and the entry is
    /// settled afterwards.
    fn staged_audit(&self, entry: &AuditLogEntry) -> Option<AuditLogEntry> {
        match self.audit_policy {
            AuditPolicy::Strict => Some(entry.clone()),
            AuditPolicy::BestEffort => None,
        }
    }

    /// Best-effort append after a committed mutation. Failures are
    /// logged and absorbed. No-op under `Strict`, where the entry was
    /// already written with the mutation.
    fn settle_audit(&self, entry: AuditLogEntry) {
        if self.audit_policy == AuditPolicy::Strict {
            return;
        }
        if let Err(err) = self.store.append_audit(entry) {
            warn!(error = %err, "audit write failed, continuing");
        }
    }

    /// Fire-and-forget notice dispatch. Transport failures are logged
    /// and absorbed so they can never fail the surrounding operation.
    fn dispatch_notice(&self, notice: RegistrationNotice) {
        let recipient = notice.recipient().to_string();
        if let Err(err) = self.notifier.send(notice) {
            warn!(%recipient, error = %err, "notification dispatch failed");
        }
    }
}
