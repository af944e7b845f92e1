//! Typed audit events, kept in a bounded in-memory ring buffer.

use serde::Serialize;

use crate::id::{AccountId, AgentId, ClaimId};
use crate::params::ProtocolParams;

/// One entry in the ledger's audit stream. Every mutation emits exactly one
/// event, except an approving `resolve`, which emits ClaimResolved followed
/// by Slashed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Deposited {
        agent: AgentId,
        owner: AccountId,
        amount: u64,
        total: u64,
        ts: u64,
    },
    UnstakeRequested {
        agent: AgentId,
        cooldown_ends_at: u64,
        ts: u64,
    },
    Withdrawn {
        agent: AgentId,
        owner: AccountId,
        amount: u64,
        remaining: u64,
        ts: u64,
    },
    ClaimSubmitted {
        claim_id: ClaimId,
        agent: AgentId,
        submitter: AccountId,
        amount: u64,
        challenge_deadline: u64,
        ts: u64,
    },
    ClaimChallenged {
        claim_id: ClaimId,
        agent: AgentId,
        ts: u64,
    },
    ClaimResolved {
        claim_id: ClaimId,
        agent: AgentId,
        approved: bool,
        ts: u64,
    },
    Slashed {
        claim_id: ClaimId,
        agent: AgentId,
        slashed: u64,
        fee: u64,
        payout: u64,
        beneficiary: AccountId,
        ts: u64,
    },
    FeesSwept {
        recipient: AccountId,
        amount: u64,
        ts: u64,
    },
    ParamsUpdated {
        params: ProtocolParams,
        ts: u64,
    },
    AccountCredited {
        account: AccountId,
        amount: u64,
        balance: u64,
        ts: u64,
    },
}
