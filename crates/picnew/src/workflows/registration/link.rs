use chrono::{DateTime, Utc};

use super::domain::{LinkStatus, RegistrationLink};

/// Reasons a registration attempt against a link is refused.
///
/// The variants form a closed set so the interface layer can map each to
/// a response without string matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkRejection {
    #[error("registration link not found")]
    NotFound,
    #[error("this registration link is inactive")]
    Inactive,
    #[error("this registration link has expired")]
    Expired,
    #[error("maximum registrations reached for this link")]
    CapacityReached,
}

/// Decide whether a registration attempt may proceed.
///
/// Pure decision function over the link record, the current time, and the
/// live registration count. Checks run in a fixed order (existence,
/// inactive, expired, capacity) so the first applicable reason is
/// reported deterministically when several hold at once.
pub fn validate_link(
    link: Option<&RegistrationLink>,
    now: DateTime<Utc>,
    current_registrations: u64,
) -> Result<(), LinkRejection> {
    let link = link.ok_or(LinkRejection::NotFound)?;

    if link.status == LinkStatus::Inactive {
        return Err(LinkRejection::Inactive);
    }

    if let Some(expired_at) = link.expired_at {
        if expired_at < now {
            return Err(LinkRejection::Expired);
        }
    }

    if let Some(max) = link.max_registrations {
        if current_registrations >= u64::from(max) {
            return Err(LinkRejection::CapacityReached);
        }
    }

    Ok(())
}
