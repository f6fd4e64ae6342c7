use super::domain::{
    AuditLogEntry, LinkCode, LinkId, LinkStatus, ProgramId, Registration, RegistrationId,
    RegistrationLink, RegistrationRecord, RegistrationStatus, RequiredDocument, SubmissionToken,
    TraineeDocument, TrainingProgram,
};
use chrono::{DateTime, Utc};

/// Partial update applied to a link; `None` fields are left untouched.
/// The code is immutable and deliberately absent here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkUpdate {
    pub max_registrations: Option<Option<u32>>,
    pub expired_at: Option<Option<DateTime<Utc>>>,
    pub status: Option<LinkStatus>,
}

/// Storage abstraction for the registration workflow.
///
/// Implementations own referential integrity and the two atomicity
/// guarantees the workflow depends on: `insert_registration` performs
/// the capacity check and the registration+document inserts as one unit
/// (a serializable transaction in a SQL store, a single lock in the
/// in-memory adapter), and `transition_registration` is a compare-and-swap
/// on the current status.
///
/// Every mutating method takes an optional [`AuditLogEntry`]. When it is
/// `Some`, the entry is appended within the same atomic unit as the
/// mutation; a failed append means nothing commits. The caller passes
/// `None` when audit is handled outside the unit.
pub trait RegistrationStore: Send + Sync {
    fn insert_link(
        &self,
        link: RegistrationLink,
        audit: Option<AuditLogEntry>,
    ) -> Result<RegistrationLink, StoreError>;
    fn find_link(&self, id: &LinkId) -> Result<Option<RegistrationLink>, StoreError>;
    fn find_link_by_code(&self, code: &LinkCode) -> Result<Option<RegistrationLink>, StoreError>;
    fn update_link(
        &self,
        id: &LinkId,
        update: LinkUpdate,
        audit: Option<AuditLogEntry>,
    ) -> Result<RegistrationLink, StoreError>;
    /// Fails with [`StoreError::Conflict`] when registrations reference the link.
    fn delete_link(
        &self,
        id: &LinkId,
        audit: Option<AuditLogEntry>,
    ) -> Result<RegistrationLink, StoreError>;

    /// Live count of registrations under the link at call time.
    fn registration_count(&self, link: &LinkId) -> Result<u64, StoreError>;

    /// Insert a registration and its documents, enforcing the link's
    /// capacity inside the same atomic unit. Either every row (including
    /// a staged audit entry) exists afterwards or none does.
    fn insert_registration(
        &self,
        link: &RegistrationLink,
        registration: Registration,
        documents: Vec<TraineeDocument>,
        audit: Option<AuditLogEntry>,
    ) -> Result<Registration, StoreError>;

    fn find_registration(&self, id: &RegistrationId)
        -> Result<Option<RegistrationRecord>, StoreError>;
    fn find_registration_by_token(
        &self,
        token: &SubmissionToken,
    ) -> Result<Option<RegistrationRecord>, StoreError>;
    fn registrations_for_link(
        &self,
        link: &LinkId,
    ) -> Result<Vec<RegistrationRecord>, StoreError>;

    /// Compare-and-swap the registration's status. Fails with
    /// [`StoreError::StaleStatus`] when the current status differs from
    /// `expected`, leaving the record unchanged.
    fn transition_registration(
        &self,
        id: &RegistrationId,
        expected: RegistrationStatus,
        next: RegistrationStatus,
        rejection_reason: Option<String>,
        audit: Option<AuditLogEntry>,
    ) -> Result<Registration, StoreError>;

    fn fetch_program(&self, id: &ProgramId) -> Result<Option<TrainingProgram>, StoreError>;
    fn required_documents(&self, program: &ProgramId) -> Result<Vec<RequiredDocument>, StoreError>;

    fn append_audit(&self, entry: AuditLogEntry) -> Result<(), StoreError>;
    fn audit_for_target(&self, target_id: &str) -> Result<Vec<AuditLogEntry>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists or is still referenced")]
    Conflict,
    #[error("registration capacity exhausted")]
    CapacityExhausted,
    #[error("registration is already {}", current.label())]
    StaleStatus { current: RegistrationStatus },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
