use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHALLENGE_PERIOD_SECS, DEFAULT_CLAIM_FEE_BPS, DEFAULT_MINIMUM_STAKE,
    DEFAULT_UNSTAKE_COOLDOWN_SECS, MAX_CLAIM_FEE_BPS,
};
use crate::error::LedgerError;

/// Process-wide protocol configuration. Mutable only through an admin-gated
/// `set_params` call; reads always see a complete, validated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Stake at or above which an agent is verified (micro-credits).
    pub minimum_stake: u64,
    /// Protocol fee on slashed amounts, in basis points (capped at 1 000).
    pub claim_fee_bps: u32,
    /// Window after claim submission during which the owner may challenge.
    pub challenge_period_secs: u64,
    /// Waiting period between unstake request and withdrawal while verified.
    pub unstake_cooldown_secs: u64,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            minimum_stake: DEFAULT_MINIMUM_STAKE,
            claim_fee_bps: DEFAULT_CLAIM_FEE_BPS,
            challenge_period_secs: DEFAULT_CHALLENGE_PERIOD_SECS,
            unstake_cooldown_secs: DEFAULT_UNSTAKE_COOLDOWN_SECS,
        }
    }
}

impl ProtocolParams {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.claim_fee_bps > MAX_CLAIM_FEE_BPS {
            return Err(LedgerError::FeeBpsOutOfRange(self.claim_fee_bps));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(ProtocolParams::default().validate().is_ok());
    }

    #[test]
    fn fee_above_cap_is_rejected() {
        let params = ProtocolParams {
            claim_fee_bps: 1_001,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(LedgerError::FeeBpsOutOfRange(1_001))
        ));
    }
}
