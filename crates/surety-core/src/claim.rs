//! Claims and their lifecycle.
//!
//! ```text
//! Pending --(owner challenges, before deadline)--> Challenged
//! Pending | Challenged --(arbitration resolves)--> Approved | Rejected
//! ```
//!
//! Approved and Rejected are terminal; a claim is never deleted, so the
//! registry doubles as an immutable audit trail.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::id::{AccountId, AgentId, ClaimId};
use crate::slash::Settlement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Challenged,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Approved | ClaimStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Challenged => "challenged",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ClaimStatus::Pending),
            "challenged" => Ok(ClaimStatus::Challenged),
            "approved" => Ok(ClaimStatus::Approved),
            "rejected" => Ok(ClaimStatus::Rejected),
            other => Err(format!("unknown claim status: {other}")),
        }
    }
}

/// A filed allegation of misbehavior requesting forfeiture of an agent's
/// stake. `amount` was validated against the stake at submission time; it
/// may exceed the current stake if later claims already reduced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub agent_id: AgentId,
    pub submitter: AccountId,
    pub amount: u64,
    pub reason: String,
    pub status: ClaimStatus,
    pub submitted_at: u64,
    /// `submitted_at + challenge_period` at the params in force on submission.
    pub challenge_deadline: u64,
    /// Present once the claim is Approved: what was actually forfeited.
    pub settlement: Option<Settlement>,
}

/// Derive a claim id from its defining fields plus a monotonic sequence
/// number. The sequence alone makes the id unique; the content fields make
/// it non-forgeable without knowing the full submission.
pub fn derive_claim_id(
    submitter: &AccountId,
    agent: &AgentId,
    amount: u64,
    reason: &str,
    submitted_at: u64,
    sequence: u64,
) -> ClaimId {
    let mut hasher = Sha256::new();
    hasher.update(submitter.as_bytes());
    hasher.update(agent.as_bytes());
    hasher.update(amount.to_le_bytes());
    hasher.update((reason.len() as u64).to_le_bytes());
    hasher.update(reason.as_bytes());
    hasher.update(submitted_at.to_le_bytes());
    hasher.update(sequence.to_le_bytes());
    ClaimId(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let submitter = AccountId([1; 32]);
        let agent = AgentId([2; 32]);
        let a = derive_claim_id(&submitter, &agent, 500, "breach", 1_000, 7);
        let b = derive_claim_id(&submitter, &agent, 500, "breach", 1_000, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn sequence_alone_changes_the_id() {
        let submitter = AccountId([1; 32]);
        let agent = AgentId([2; 32]);
        let a = derive_claim_id(&submitter, &agent, 500, "breach", 1_000, 7);
        let b = derive_claim_id(&submitter, &agent, 500, "breach", 1_000, 8);
        assert_ne!(a, b);
    }

    #[test]
    fn terminal_states() {
        assert!(!ClaimStatus::Pending.is_terminal());
        assert!(!ClaimStatus::Challenged.is_terminal());
        assert!(ClaimStatus::Approved.is_terminal());
        assert!(ClaimStatus::Rejected.is_terminal());
    }

    #[test]
    fn status_roundtrips_through_str() {
        for status in [
            ClaimStatus::Pending,
            ClaimStatus::Challenged,
            ClaimStatus::Approved,
            ClaimStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ClaimStatus>().unwrap(), status);
        }
    }
}
