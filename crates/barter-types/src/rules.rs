//! Exchange rules: which trades may be proposed and who may settle them.

use uuid::Uuid;

use crate::models::{Ad, ProposalStatus};

/// Why two ads cannot be traded against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeViolation {
    SameAd,
    SameOwner,
}

impl ExchangeViolation {
    pub fn message(self) -> &'static str {
        match self {
            Self::SameAd => "You cannot exchange an ad for itself.",
            Self::SameOwner => "You cannot exchange your own ads with each other.",
        }
    }
}

/// Cross-field check run once both ads of a proposal have been resolved.
/// The same-ad check wins when both apply.
pub fn check_exchange(sender: &Ad, receiver: &Ad) -> Result<(), ExchangeViolation> {
    if sender.id == receiver.id {
        return Err(ExchangeViolation::SameAd);
    }
    if sender.owner_id == receiver.owner_id {
        return Err(ExchangeViolation::SameOwner);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// Caller does not own the receiver ad.
    NotReceiverOwner,
    /// Proposal was already accepted or rejected.
    AlreadyResolved(ProposalStatus),
}

/// Statuses a proposal may be moved to. Anything else is not actionable.
pub fn actionable_status(raw: &str) -> Option<ProposalStatus> {
    match raw.parse() {
        Ok(status @ (ProposalStatus::Accepted | ProposalStatus::Rejected)) => Some(status),
        _ => None,
    }
}

/// Decide the outcome of a status update request.
///
/// `Ok(None)` means the requested value is not actionable and the proposal is
/// left as it is. Authorization is checked before the requested value.
pub fn decide_transition(
    current: ProposalStatus,
    receiver_owner: Uuid,
    caller: Uuid,
    requested: &str,
) -> Result<Option<ProposalStatus>, TransitionError> {
    if receiver_owner != caller {
        return Err(TransitionError::NotReceiverOwner);
    }

    let Some(target) = actionable_status(requested) else {
        return Ok(None);
    };

    if current != ProposalStatus::Pending {
        return Err(TransitionError::AlreadyResolved(current));
    }

    Ok(Some(target))
}
