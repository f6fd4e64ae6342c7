use serde::{Deserialize, Serialize};

/// Outbound mail the workflow wants delivered to an applicant.
///
/// Content mirrors the three applicant-facing emails: submission
/// confirmation, approval, and rejection. Transport is the adapter's
/// concern; the workflow only hands over the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationNotice {
    Received {
        email: String,
        full_name: String,
        link_code: String,
    },
    Approved {
        email: String,
        full_name: String,
        program_name: String,
    },
    Rejected {
        email: String,
        full_name: String,
        reason: String,
    },
}

impl RegistrationNotice {
    pub fn recipient(&self) -> &str {
        match self {
            RegistrationNotice::Received { email, .. }
            | RegistrationNotice::Approved { email, .. }
            | RegistrationNotice::Rejected { email, .. } => email,
        }
    }
}

/// Capability for dispatching applicant notices. Injected at the
/// composition root; the workflow treats delivery as best-effort and
/// never fails an operation on a transport error.
pub trait Notifier: Send + Sync {
    fn send(&self, notice: RegistrationNotice) -> Result<(), NotifyError>;
}

/// Notice dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}
