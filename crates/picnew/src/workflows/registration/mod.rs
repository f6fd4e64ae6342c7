//! Registration-link lifecycle and submission workflow.
//!
//! A link is a shareable, capacity- and time-bounded invitation code.
//! Anonymous submitters are gated by the pure [`link::validate_link`]
//! decision, the orchestrator persists their registration and documents
//! atomically, and admins move registrations through the
//! PENDING -> APPROVED | REJECTED state machine. Every mutating action
//! leaves an audit entry.

pub mod domain;
pub mod link;
pub mod notifier;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, ApplicantDetails, AuditAction, AuditLogEntry, DocumentUpload, LinkCode, LinkId,
    LinkStatus, ProgramId, Registration, RegistrationId, RegistrationLink, RegistrationRecord,
    RegistrationStatus, RequiredDocument, SubmissionToken, TraineeDocument, TrainingProgram,
};
pub use link::{validate_link, LinkRejection};
pub use notifier::{Notifier, NotifyError, RegistrationNotice};
pub use repository::{LinkUpdate, RegistrationStore, StoreError};
pub use router::{admin_routes, public_routes, registration_router};
pub use service::{
    CreateLinkRequest, LinkDetail, LinkSummary, RegistrationService, RegistrationStatusView,
    SubmissionReceipt, SubmissionRequest, UpdateLinkRequest, WorkflowError,
};
