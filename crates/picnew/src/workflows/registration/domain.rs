use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registration links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub String);

/// Identifier wrapper for submitted registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(pub String);

/// Identifier wrapper for training programs (reference data).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramId(pub String);

/// Human-shareable invitation code. Unique and immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkCode(pub String);

/// Opaque credential handed to an anonymous submitter for status polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionToken(pub String);

/// Whether a link currently admits submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Active,
    Inactive,
}

impl LinkStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LinkStatus::Active => "ACTIVE",
            LinkStatus::Inactive => "INACTIVE",
        }
    }
}

/// A capacity- and time-bounded invitation to register for a training program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationLink {
    pub id: LinkId,
    pub code: LinkCode,
    pub training_program_id: ProgramId,
    /// `None` means unlimited.
    pub max_registrations: Option<u32>,
    pub expired_at: Option<DateTime<Utc>>,
    pub status: LinkStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Review state of a registration. Transitions are one-directional:
/// `Pending` may become `Approved` or `Rejected`, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "PENDING",
            RegistrationStatus::Approved => "APPROVED",
            RegistrationStatus::Rejected => "REJECTED",
        }
    }
}

/// Applicant-supplied fields collected by the public submission form.
/// Region fields reference the external province/regency/district/village
/// hierarchy and are carried opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub bidang: String,
    pub training_class_id: String,
    pub personnel_type_id: String,
    pub province_id: String,
    pub regency_id: String,
    pub district_id: String,
    pub village_id: String,
    pub address: String,
}

/// Locator and metadata for a file the applicant already uploaded to
/// external storage; the workflow never touches file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub document_type_id: String,
    pub file_name: String,
    pub file_url: String,
}

/// Stored document row attached to a registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraineeDocument {
    pub registration_id: RegistrationId,
    pub document_type_id: String,
    pub file_name: String,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A submitted registration under a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub registration_link_id: LinkId,
    pub submission_token: SubmissionToken,
    pub applicant: ApplicantDetails,
    pub status: RegistrationStatus,
    /// Set only when the registration is rejected.
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration plus its attached documents, as the store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub registration: Registration,
    pub documents: Vec<TraineeDocument>,
}

/// Training program reference data consumed (not owned) by the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingProgram {
    pub id: ProgramId,
    pub name: String,
    pub code: String,
    pub bidang: String,
    pub duration_days: u16,
}

/// A document type mandatory for a given training program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredDocument {
    pub document_type_id: String,
    pub name: String,
}

/// Who performed a mutating action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    /// Unauthenticated/system-initiated action (public submissions).
    System,
    /// Authenticated admin, identified by user id. Authentication itself
    /// happens at the boundary; the workflow trusts the id it is given.
    Admin(String),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::System => "SYSTEM",
            Actor::Admin(user_id) => user_id,
        }
    }
}

/// Enumerated tags for audit entries, one per mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    NewRegistration,
    ApproveRegistration,
    RejectRegistration,
    CreateLink,
    UpdateLink,
    DeleteLink,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            AuditAction::NewRegistration => "NEW_REGISTRATION",
            AuditAction::ApproveRegistration => "APPROVE_REGISTRATION",
            AuditAction::RejectRegistration => "REJECT_REGISTRATION",
            AuditAction::CreateLink => "CREATE_LINK",
            AuditAction::UpdateLink => "UPDATE_LINK",
            AuditAction::DeleteLink => "DELETE_LINK",
        }
    }
}

/// Append-only record of a mutating action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub actor: String,
    pub action: AuditAction,
    pub description: String,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}
