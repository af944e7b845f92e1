use thiserror::Error;

use crate::id::{AgentId, ClaimId};

/// Coarse error taxonomy, used by callers (e.g. the HTTP layer) to map
/// failures onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    Authorization,
    Arithmetic,
}

/// Every operation either completes fully or fails with one of these before
/// any mutation. There is no partial-failure state to roll back.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount is zero or exceeds the available balance")]
    InvalidAmount,

    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("unknown claim: {0}")]
    ClaimNotFound(ClaimId),

    #[error("account holds {available} but {required} is needed")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("agent {0} is not verified")]
    AgentNotVerified(AgentId),

    #[error("withdrawal cooldown has not elapsed")]
    CooldownNotElapsed,

    #[error("challenge period expired at {deadline}")]
    ChallengePeriodExpired { deadline: u64 },

    #[error("claim has already been challenged")]
    ClaimAlreadyChallenged,

    #[error("claim is already resolved")]
    ClaimAlreadyResolved,

    #[error("caller lacks the required capability")]
    NotAuthorized,

    #[error("claim fee {0} bps exceeds the 1000 bps cap")]
    FeeBpsOutOfRange(u32),

    #[error("balance arithmetic overflow")]
    BalanceOverflow,

    #[error("custodial balance {custodial} is below total recorded stake {total_staked}")]
    InconsistentCustody { custodial: u64, total_staked: u64 },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            InvalidAmount | UnknownAgent(_) | ClaimNotFound(_) | InsufficientFunds { .. }
            | FeeBpsOutOfRange(_) => ErrorKind::Validation,
            AgentNotVerified(_) | CooldownNotElapsed | ChallengePeriodExpired { .. }
            | ClaimAlreadyChallenged | ClaimAlreadyResolved | InconsistentCustody { .. } => {
                ErrorKind::State
            }
            NotAuthorized => ErrorKind::Authorization,
            BalanceOverflow => ErrorKind::Arithmetic,
        }
    }
}
