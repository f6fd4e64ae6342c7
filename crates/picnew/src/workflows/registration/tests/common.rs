use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use crate::config::AuditPolicy;
use crate::workflows::registration::domain::{
    ApplicantDetails, AuditLogEntry, LinkCode, LinkId, LinkStatus, ProgramId, Registration,
    RegistrationId, RegistrationLink, RegistrationRecord, RegistrationStatus, RequiredDocument,
    SubmissionToken, TraineeDocument, TrainingProgram,
};
use crate::workflows::registration::notifier::{Notifier, NotifyError, RegistrationNotice};
use crate::workflows::registration::repository::{LinkUpdate, RegistrationStore, StoreError};
use crate::workflows::registration::service::{RegistrationService, SubmissionRequest};
use crate::workflows::registration::DocumentUpload;

#[derive(Default)]
struct MemoryState {
    links: HashMap<LinkId, RegistrationLink>,
    registrations: HashMap<RegistrationId, Registration>,
    documents: Vec<TraineeDocument>,
    audit: Vec<AuditLogEntry>,
    programs: HashMap<ProgramId, TrainingProgram>,
    required: HashMap<ProgramId, Vec<RequiredDocument>>,
}

/// In-memory store double. A single mutex over every table makes the
/// capacity-checked insert and the status CAS naturally atomic.
#[derive(Default)]
pub(super) struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_audit: AtomicBool,
}

impl MemoryStore {
    pub(super) fn seed_program(&self, program: TrainingProgram, required: Vec<RequiredDocument>) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.required.insert(program.id.clone(), required);
        state.programs.insert(program.id.clone(), program);
    }

    pub(super) fn seed_link(&self, link: RegistrationLink) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.links.insert(link.id.clone(), link);
    }

    pub(super) fn fail_audit_writes(&self) {
        self.fail_audit.store(true, Ordering::SeqCst);
    }

    pub(super) fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .audit
            .clone()
    }

    pub(super) fn registration(&self, id: &RegistrationId) -> Option<Registration> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .registrations
            .get(id)
            .cloned()
    }

    pub(super) fn document_count(&self) -> usize {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .documents
            .len()
    }
}

impl MemoryStore {
    fn stage_audit(
        &self,
        state: &mut MemoryState,
        audit: Option<AuditLogEntry>,
    ) -> Result<(), StoreError> {
        if let Some(entry) = audit {
            if self.fail_audit.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("audit table offline".to_string()));
            }
            state.audit.push(entry);
        }
        Ok(())
    }
}

impl RegistrationStore for MemoryStore {
    fn insert_link(
        &self,
        link: RegistrationLink,
        audit: Option<AuditLogEntry>,
    ) -> Result<RegistrationLink, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state.links.contains_key(&link.id)
            || state.links.values().any(|other| other.code == link.code)
        {
            return Err(StoreError::Conflict);
        }
        self.stage_audit(&mut state, audit)?;
        state.links.insert(link.id.clone(), link.clone());
        Ok(link)
    }

    fn find_link(&self, id: &LinkId) -> Result<Option<RegistrationLink>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.links.get(id).cloned())
    }

    fn find_link_by_code(&self, code: &LinkCode) -> Result<Option<RegistrationLink>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.links.values().find(|link| &link.code == code).cloned())
    }

    fn update_link(
        &self,
        id: &LinkId,
        update: LinkUpdate,
        audit: Option<AuditLogEntry>,
    ) -> Result<RegistrationLink, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if !state.links.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        self.stage_audit(&mut state, audit)?;
        let link = state.links.get_mut(id).ok_or(StoreError::NotFound)?;
        if let Some(max) = update.max_registrations {
            link.max_registrations = max;
        }
        if let Some(expired_at) = update.expired_at {
            link.expired_at = expired_at;
        }
        if let Some(status) = update.status {
            link.status = status;
        }
        Ok(link.clone())
    }

    fn delete_link(
        &self,
        id: &LinkId,
        audit: Option<AuditLogEntry>,
    ) -> Result<RegistrationLink, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if !state.links.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        if state
            .registrations
            .values()
            .any(|registration| &registration.registration_link_id == id)
        {
            return Err(StoreError::Conflict);
        }
        self.stage_audit(&mut state, audit)?;
        state.links.remove(id).ok_or(StoreError::NotFound)
    }

    fn registration_count(&self, link: &LinkId) -> Result<u64, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .registrations
            .values()
            .filter(|registration| &registration.registration_link_id == link)
            .count() as u64)
    }

    fn insert_registration(
        &self,
        link: &RegistrationLink,
        registration: Registration,
        documents: Vec<TraineeDocument>,
        audit: Option<AuditLogEntry>,
    ) -> Result<Registration, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if !state.links.contains_key(&link.id) {
            return Err(StoreError::NotFound);
        }
        if let Some(max) = link.max_registrations {
            let current = state
                .registrations
                .values()
                .filter(|existing| existing.registration_link_id == link.id)
                .count() as u64;
            if current >= u64::from(max) {
                return Err(StoreError::CapacityExhausted);
            }
        }
        self.stage_audit(&mut state, audit)?;
        state
            .registrations
            .insert(registration.id.clone(), registration.clone());
        state.documents.extend(documents);
        Ok(registration)
    }

    fn find_registration(
        &self,
        id: &RegistrationId,
    ) -> Result<Option<RegistrationRecord>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.registrations.get(id).cloned().map(|registration| {
            let documents = state
                .documents
                .iter()
                .filter(|document| document.registration_id == registration.id)
                .cloned()
                .collect();
            RegistrationRecord {
                registration,
                documents,
            }
        }))
    }

    fn find_registration_by_token(
        &self,
        token: &SubmissionToken,
    ) -> Result<Option<RegistrationRecord>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .registrations
            .values()
            .find(|registration| &registration.submission_token == token)
            .cloned()
            .map(|registration| {
                let documents = state
                    .documents
                    .iter()
                    .filter(|document| document.registration_id == registration.id)
                    .cloned()
                    .collect();
                RegistrationRecord {
                    registration,
                    documents,
                }
            }))
    }

    fn registrations_for_link(
        &self,
        link: &LinkId,
    ) -> Result<Vec<RegistrationRecord>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut records: Vec<RegistrationRecord> = state
            .registrations
            .values()
            .filter(|registration| &registration.registration_link_id == link)
            .cloned()
            .map(|registration| {
                let documents = state
                    .documents
                    .iter()
                    .filter(|document| document.registration_id == registration.id)
                    .cloned()
                    .collect();
                RegistrationRecord {
                    registration,
                    documents,
                }
            })
            .collect();
        records.sort_by(|a, b| a.registration.created_at.cmp(&b.registration.created_at));
        Ok(records)
    }

    fn transition_registration(
        &self,
        id: &RegistrationId,
        expected: RegistrationStatus,
        next: RegistrationStatus,
        rejection_reason: Option<String>,
        audit: Option<AuditLogEntry>,
    ) -> Result<Registration, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let current = state
            .registrations
            .get(id)
            .ok_or(StoreError::NotFound)?
            .status;
        if current != expected {
            return Err(StoreError::StaleStatus { current });
        }
        self.stage_audit(&mut state, audit)?;
        let registration = state.registrations.get_mut(id).ok_or(StoreError::NotFound)?;
        registration.status = next;
        registration.rejection_reason = rejection_reason;
        Ok(registration.clone())
    }

    fn fetch_program(&self, id: &ProgramId) -> Result<Option<TrainingProgram>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.programs.get(id).cloned())
    }

    fn required_documents(&self, program: &ProgramId) -> Result<Vec<RequiredDocument>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.required.get(program).cloned().unwrap_or_default())
    }

    fn append_audit(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit table offline".to_string()));
        }
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.audit.push(entry);
        Ok(())
    }

    fn audit_for_target(&self, target_id: &str) -> Result<Vec<AuditLogEntry>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .audit
            .iter()
            .filter(|entry| entry.target_id == target_id)
            .cloned()
            .collect())
    }
}

/// Notifier double recording every notice; can be switched to failing.
#[derive(Default)]
pub(super) struct MemoryNotifier {
    notices: Mutex<Vec<RegistrationNotice>>,
    fail: AtomicBool,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<RegistrationNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, notice: RegistrationNotice) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("smtp unreachable".to_string()));
        }
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) const LINK_CODE: &str = "ABC123XYZ789";

pub(super) fn program() -> TrainingProgram {
    TrainingProgram {
        id: ProgramId("prog-k3-umum".to_string()),
        name: "K3 Umum".to_string(),
        code: "K3U".to_string(),
        bidang: "Keselamatan Kerja".to_string(),
        duration_days: 12,
    }
}

pub(super) fn required_documents() -> Vec<RequiredDocument> {
    vec![
        RequiredDocument {
            document_type_id: "doc-ktp".to_string(),
            name: "KTP".to_string(),
        },
        RequiredDocument {
            document_type_id: "doc-ijazah".to_string(),
            name: "Ijazah Terakhir".to_string(),
        },
    ]
}

pub(super) fn active_link(max_registrations: Option<u32>) -> RegistrationLink {
    RegistrationLink {
        id: LinkId("link-1".to_string()),
        code: LinkCode(LINK_CODE.to_string()),
        training_program_id: program().id,
        max_registrations,
        expired_at: None,
        status: LinkStatus::Active,
        created_by: "admin-1".to_string(),
        created_at: Utc::now() - Duration::days(1),
    }
}

pub(super) fn applicant(full_name: &str, email: &str) -> ApplicantDetails {
    ApplicantDetails {
        full_name: full_name.to_string(),
        email: email.to_string(),
        phone_number: "+62811111111".to_string(),
        bidang: "Keselamatan Kerja".to_string(),
        training_class_id: "class-jakarta-okt".to_string(),
        personnel_type_id: "ptype-ahli-k3".to_string(),
        province_id: "31".to_string(),
        regency_id: "31.71".to_string(),
        district_id: "31.71.01".to_string(),
        village_id: "31.71.01.1001".to_string(),
        address: "Jl. Merdeka No. 1".to_string(),
    }
}

pub(super) fn submission(code: &str) -> SubmissionRequest {
    SubmissionRequest {
        code: code.to_string(),
        applicant: applicant("Budi Santoso", "budi@example.com"),
        documents: vec![
            DocumentUpload {
                document_type_id: "doc-ktp".to_string(),
                file_name: "ktp.pdf".to_string(),
                file_url: "https://storage.example.com/uploads/ktp.pdf".to_string(),
            },
            DocumentUpload {
                document_type_id: "doc-ijazah".to_string(),
                file_name: "ijazah.pdf".to_string(),
                file_url: "https://storage.example.com/uploads/ijazah.pdf".to_string(),
            },
        ],
    }
}

pub(super) fn build_service() -> (
    RegistrationService<MemoryStore, MemoryNotifier>,
    Arc<MemoryStore>,
    Arc<MemoryNotifier>,
) {
    build_service_with_policy(AuditPolicy::BestEffort)
}

pub(super) fn build_service_with_policy(
    policy: AuditPolicy,
) -> (
    RegistrationService<MemoryStore, MemoryNotifier>,
    Arc<MemoryStore>,
    Arc<MemoryNotifier>,
) {
    let store = Arc::new(MemoryStore::default());
    store.seed_program(program(), required_documents());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = RegistrationService::new(store.clone(), notifier.clone(), policy);
    (service, store, notifier)
}

pub(super) fn build_service_with_link(
    max_registrations: Option<u32>,
) -> (
    RegistrationService<MemoryStore, MemoryNotifier>,
    Arc<MemoryStore>,
    Arc<MemoryNotifier>,
) {
    let (service, store, notifier) = build_service();
    store.seed_link(active_link(max_registrations));
    (service, store, notifier)
}

/// Router wired the way the API service wires it: public and admin routes
/// merged, with a pre-authenticated admin actor injected as an extension.
pub(super) fn router_with_service(
    service: RegistrationService<MemoryStore, MemoryNotifier>,
) -> axum::Router {
    use crate::workflows::registration::domain::Actor;
    use crate::workflows::registration::router::registration_router;

    registration_router(Arc::new(service))
        .layer(axum::Extension(Actor::Admin("admin-1".to_string())))
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
