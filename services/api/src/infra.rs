use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use picnew::workflows::registration::{
    AuditLogEntry, LinkCode, LinkId, LinkUpdate, Notifier, NotifyError, ProgramId, Registration,
    RegistrationId, RegistrationLink, RegistrationNotice, RegistrationRecord, RegistrationStatus,
    RegistrationStore, RequiredDocument, StoreError, SubmissionToken, TraineeDocument,
    TrainingProgram,
};

/// Parse a `YYYY-MM-DD` CLI argument into an end-of-day UTC expiry, so a
/// link stays usable through the whole closing date.
pub(crate) fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| format!("invalid date {raw:?}: {err}"))?;
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| format!("invalid date {raw:?}"))?;
    Ok(Utc.from_utc_datetime(&end_of_day))
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Tables {
    links: HashMap<LinkId, RegistrationLink>,
    registrations: HashMap<RegistrationId, Registration>,
    documents: Vec<TraineeDocument>,
    audit: Vec<AuditLogEntry>,
    programs: HashMap<ProgramId, TrainingProgram>,
    required: HashMap<ProgramId, Vec<RequiredDocument>>,
}

/// Store backing the service in single-process deployments. One mutex
/// guards every table, which makes the capacity-checked registration
/// insert and the status CAS atomic without further coordination.
#[derive(Default)]
pub(crate) struct InMemoryRegistrationStore {
    tables: Mutex<Tables>,
}

impl InMemoryRegistrationStore {
    pub(crate) fn seed_program(
        &self,
        program: TrainingProgram,
        required: Vec<RequiredDocument>,
    ) {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        tables.required.insert(program.id.clone(), required);
        tables.programs.insert(program.id.clone(), program);
    }

    pub(crate) fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.tables.lock().expect("store mutex poisoned").audit.clone()
    }
}

fn stage_audit(tables: &mut Tables, audit: Option<AuditLogEntry>) {
    if let Some(entry) = audit {
        tables.audit.push(entry);
    }
}

impl RegistrationStore for InMemoryRegistrationStore {
    fn insert_link(
        &self,
        link: RegistrationLink,
        audit: Option<AuditLogEntry>,
    ) -> Result<RegistrationLink, StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        if tables.links.contains_key(&link.id)
            || tables.links.values().any(|other| other.code == link.code)
        {
            return Err(StoreError::Conflict);
        }
        stage_audit(&mut tables, audit);
        tables.links.insert(link.id.clone(), link.clone());
        Ok(link)
    }

    fn find_link(&self, id: &LinkId) -> Result<Option<RegistrationLink>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.links.get(id).cloned())
    }

    fn find_link_by_code(&self, code: &LinkCode) -> Result<Option<RegistrationLink>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.links.values().find(|link| &link.code == code).cloned())
    }

    fn update_link(
        &self,
        id: &LinkId,
        update: LinkUpdate,
        audit: Option<AuditLogEntry>,
    ) -> Result<RegistrationLink, StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        if !tables.links.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        stage_audit(&mut tables, audit);
        let link = tables.links.get_mut(id).ok_or(StoreError::NotFound)?;
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
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        if !tables.links.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        if tables
            .registrations
            .values()
            .any(|registration| &registration.registration_link_id == id)
        {
            return Err(StoreError::Conflict);
        }
        stage_audit(&mut tables, audit);
        tables.links.remove(id).ok_or(StoreError::NotFound)
    }

    fn registration_count(&self, link: &LinkId) -> Result<u64, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
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
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        if !tables.links.contains_key(&link.id) {
            return Err(StoreError::NotFound);
        }
        if let Some(max) = link.max_registrations {
            let current = tables
                .registrations
                .values()
                .filter(|existing| existing.registration_link_id == link.id)
                .count() as u64;
            if current >= u64::from(max) {
                return Err(StoreError::CapacityExhausted);
            }
        }
        stage_audit(&mut tables, audit);
        tables
            .registrations
            .insert(registration.id.clone(), registration.clone());
        tables.documents.extend(documents);
        Ok(registration)
    }

    fn find_registration(
        &self,
        id: &RegistrationId,
    ) -> Result<Option<RegistrationRecord>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.registrations.get(id).cloned().map(|registration| {
            let documents = tables
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
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .registrations
            .values()
            .find(|registration| &registration.submission_token == token)
            .cloned()
            .map(|registration| {
                let documents = tables
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
        let tables = self.tables.lock().expect("store mutex poisoned");
        let mut records: Vec<RegistrationRecord> = tables
            .registrations
            .values()
            .filter(|registration| &registration.registration_link_id == link)
            .cloned()
            .map(|registration| {
                let documents = tables
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
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let current = tables
            .registrations
            .get(id)
            .ok_or(StoreError::NotFound)?
            .status;
        if current != expected {
            return Err(StoreError::StaleStatus { current });
        }
        stage_audit(&mut tables, audit);
        let registration = tables.registrations.get_mut(id).ok_or(StoreError::NotFound)?;
        registration.status = next;
        registration.rejection_reason = rejection_reason;
        Ok(registration.clone())
    }

    fn fetch_program(&self, id: &ProgramId) -> Result<Option<TrainingProgram>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.programs.get(id).cloned())
    }

    fn required_documents(&self, program: &ProgramId) -> Result<Vec<RequiredDocument>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.required.get(program).cloned().unwrap_or_default())
    }

    fn append_audit(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        tables.audit.push(entry);
        Ok(())
    }

    fn audit_for_target(&self, target_id: &str) -> Result<Vec<AuditLogEntry>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .audit
            .iter()
            .filter(|entry| entry.target_id == target_id)
            .cloned()
            .collect())
    }
}

/// Notifier that writes each applicant notice to the log instead of a
/// mail transport. Stands in until SMTP credentials are wired up.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn send(&self, notice: RegistrationNotice) -> Result<(), NotifyError> {
        match &notice {
            RegistrationNotice::Received {
                email, link_code, ..
            } => {
                tracing::info!(%email, %link_code, "registration received notice");
            }
            RegistrationNotice::Approved {
                email,
                program_name,
                ..
            } => {
                tracing::info!(%email, %program_name, "registration approved notice");
            }
            RegistrationNotice::Rejected { email, reason, .. } => {
                tracing::info!(%email, %reason, "registration rejected notice");
            }
        }
        Ok(())
    }
}

/// Reference data the workflow consumes but does not own. Replaced by
/// the master-data service in multi-process deployments.
pub(crate) fn seed_reference_data(store: &InMemoryRegistrationStore) {
    let identity_documents = vec![
        RequiredDocument {
            document_type_id: "doc-ktp".to_string(),
            name: "KTP".to_string(),
        },
        RequiredDocument {
            document_type_id: "doc-ijazah".to_string(),
            name: "Ijazah Terakhir".to_string(),
        },
        RequiredDocument {
            document_type_id: "doc-foto".to_string(),
            name: "Pas Foto 3x4".to_string(),
        },
    ];

    store.seed_program(
        TrainingProgram {
            id: ProgramId("prog-k3-umum".to_string()),
            name: "K3 Umum".to_string(),
            code: "K3U".to_string(),
            bidang: "Keselamatan Kerja".to_string(),
            duration_days: 12,
        },
        identity_documents.clone(),
    );
    store.seed_program(
        TrainingProgram {
            id: ProgramId("prog-k3-listrik".to_string()),
            name: "K3 Listrik".to_string(),
            code: "K3L".to_string(),
            bidang: "Keselamatan Kerja".to_string(),
            duration_days: 8,
        },
        identity_documents.clone(),
    );
    store.seed_program(
        TrainingProgram {
            id: ProgramId("prog-petugas-p3k".to_string()),
            name: "Petugas P3K".to_string(),
            code: "P3K".to_string(),
            bidang: "Kesehatan Kerja".to_string(),
            duration_days: 4,
        },
        identity_documents,
    );
}
