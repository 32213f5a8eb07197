//! Proposal status derivation from raw governor state.

use crate::models::ProposalStatus;

/// The chain fields a proposal's status depends on.
#[derive(Debug, Clone, Default)]
pub struct RawProposalState {
    pub vote_start: i64,
    pub vote_end: i64,
    pub for_votes: i64,
    pub against_votes: i64,
    pub quorum_votes: i64,
    pub executed: bool,
    pub canceled: bool,
    pub vetoed: bool,
    pub queued: bool,
    pub expires_at: Option<i64>,
}

/// Mirrors the governor's `state()` ordering, evaluated at `now` (unix seconds).
pub fn derive_status(raw: &RawProposalState, now: i64) -> ProposalStatus {
    if raw.vetoed {
        return ProposalStatus::Vetoed;
    }
    if raw.canceled {
        return ProposalStatus::Cancelled;
    }
    if raw.executed {
        return ProposalStatus::Executed;
    }
    if now < raw.vote_start {
        return ProposalStatus::Pending;
    }
    if now <= raw.vote_end {
        return ProposalStatus::Active;
    }
    if raw.for_votes <= raw.against_votes || raw.for_votes < raw.quorum_votes {
        return ProposalStatus::Defeated;
    }
    if raw.queued {
        return match raw.expires_at {
            Some(expires_at) if now >= expires_at => ProposalStatus::Expired,
            _ => ProposalStatus::Queued,
        };
    }
    ProposalStatus::Succeeded
}
