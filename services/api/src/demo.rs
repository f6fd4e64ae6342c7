use crate::infra::{parse_expiry, seed_reference_data, InMemoryRegistrationStore};
use chrono::{DateTime, Utc};
use clap::Args;
use std::sync::{Arc, Mutex};

use picnew::config::AuditPolicy;
use picnew::error::AppError;
use picnew::workflows::registration::{
    Actor, ApplicantDetails, CreateLinkRequest, DocumentUpload, Notifier, NotifyError, ProgramId,
    RegistrationNotice, RegistrationService, SubmissionRequest,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Training program to open the batch for
    #[arg(long, default_value = "prog-k3-umum")]
    pub(crate) program: String,
    /// Registration cap for the demo link
    #[arg(long, default_value_t = 1)]
    pub(crate) max_registrations: u32,
    /// Closing date for the demo link (YYYY-MM-DD, open-ended when omitted)
    #[arg(long, value_parser = parse_expiry)]
    pub(crate) expired_at: Option<DateTime<Utc>>,
}

/// Notifier that collects notices so the demo can print them at the end.
#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<RegistrationNotice>>,
}

impl RecordingNotifier {
    fn notices(&self) -> Vec<RegistrationNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notice: RegistrationNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

fn demo_applicant(full_name: &str, email: &str) -> ApplicantDetails {
    ApplicantDetails {
        full_name: full_name.to_string(),
        email: email.to_string(),
        phone_number: "+62812345678".to_string(),
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

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        program,
        max_registrations,
        expired_at,
    } = args;

    println!("Training registration demo");

    let store = Arc::new(InMemoryRegistrationStore::default());
    seed_reference_data(&store);
    let notifier = Arc::new(RecordingNotifier::default());
    let service = RegistrationService::new(store.clone(), notifier.clone(), AuditPolicy::Strict);

    let admin = Actor::Admin("demo-admin".to_string());
    let link = service.create_link(
        CreateLinkRequest {
            training_program_id: ProgramId(program),
            max_registrations: Some(max_registrations),
            expired_at,
        },
        &admin,
    )?;
    println!(
        "- Opened batch {} (cap {}) for program {}",
        link.code.0, max_registrations, link.training_program_id.0
    );

    let summary = service.validate_link(&link.code.0)?;
    println!(
        "- Link admits submissions: {}/{} slots used, {} required documents",
        summary.current_registrations,
        summary
            .max_registrations
            .map(|max| max.to_string())
            .unwrap_or_else(|| "unlimited".to_string()),
        summary.required_documents.len()
    );

    let receipt = service.submit(SubmissionRequest {
        code: link.code.0.clone(),
        applicant: demo_applicant("Budi Santoso", "budi@example.com"),
        documents: vec![DocumentUpload {
            document_type_id: "doc-ktp".to_string(),
            file_name: "ktp.pdf".to_string(),
            file_url: "https://storage.example.com/uploads/ktp.pdf".to_string(),
        }],
    })?;
    println!(
        "- Budi Santoso registered -> id {} token {}",
        receipt.registration_id.0, receipt.submission_token.0
    );

    match service.submit(SubmissionRequest {
        code: link.code.0.clone(),
        applicant: demo_applicant("Siti Aminah", "siti@example.com"),
        documents: Vec::new(),
    }) {
        Ok(extra) => println!(
            "- Siti Aminah registered -> id {}",
            extra.registration_id.0
        ),
        Err(err) => println!("- Siti Aminah turned away: {err}"),
    }

    let approved = service.approve(&receipt.registration_id, &admin)?;
    println!(
        "- Admin approved {} -> status {}",
        approved.applicant.full_name,
        approved.status.label()
    );

    let view = service.status(&receipt.submission_token.0)?;
    println!(
        "- Token poll sees status {} with {} documents",
        view.registration.status.label(),
        view.documents.len()
    );

    let csv = service.export_registrations(&link.id)?;
    println!("\nExport for link {}:\n{csv}", link.code.0);

    println!("Audit trail:");
    for entry in store.audit_entries() {
        println!(
            "- [{}] {} by {}: {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.action.label(),
            entry.actor,
            entry.description
        );
    }

    println!("\nNotices dispatched:");
    for notice in notifier.notices() {
        match notice {
            RegistrationNotice::Received {
                email, link_code, ..
            } => println!("- received confirmation -> {email} (link {link_code})"),
            RegistrationNotice::Approved {
                email,
                program_name,
                ..
            } => println!("- approval -> {email} ({program_name})"),
            RegistrationNotice::Rejected { email, reason, .. } => {
                println!("- rejection -> {email} ({reason})")
            }
        }
    }

    Ok(())
}
