//! Per-agent collateral positions.

use serde::{Deserialize, Serialize};

use crate::id::AgentId;

/// Internal collateral record for one agent. Owned exclusively by the
/// ledger; mutated only by deposit/withdraw/slash while the agent's lock
/// is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Staked amount in micro-credits.
    pub amount: u64,
    /// Unix seconds of the first non-zero deposit of the current cycle.
    /// A cycle ends when the balance returns to zero.
    pub staked_at: u64,
    /// Set by the first `request_unstake` of a cooldown cycle; cleared when
    /// the balance reaches zero. Repeated requests do not move it.
    pub unstake_requested_at: Option<u64>,
}

impl StakePosition {
    pub fn empty() -> Self {
        Self {
            amount: 0,
            staked_at: 0,
            unstake_requested_at: None,
        }
    }

    /// Verified status is derived, never stored, so a change to
    /// `minimum_stake` can never leave a stale flag behind.
    pub fn verified(&self, minimum_stake: u64) -> bool {
        self.amount >= minimum_stake
    }
}

/// Read-only snapshot returned by `get_stake_info`, with the derived fields
/// evaluated at read time.
#[derive(Debug, Clone, Serialize)]
pub struct StakeInfo {
    pub agent_id: AgentId,
    pub amount: u64,
    pub staked_at: u64,
    pub verified: bool,
    pub unstake_requested_at: Option<u64>,
    pub withdrawable: bool,
}
