pub mod auth;
pub mod claim;
pub mod clock;
pub mod constants;
pub mod cooldown;
pub mod error;
pub mod events;
pub mod id;
pub mod ledger;
pub mod params;
pub mod slash;
pub mod stake;
pub mod vault;

pub use auth::{AgentDirectory, Caller, MemoryDirectory};
pub use claim::{Claim, ClaimStatus};
pub use clock::Clock;
pub use error::{ErrorKind, LedgerError};
pub use events::LedgerEvent;
pub use id::{AccountId, AgentId, ClaimId};
pub use ledger::{LedgerSnapshot, NetworkStats, Resolution, TrustLedger};
pub use params::ProtocolParams;
pub use slash::Settlement;
pub use stake::{StakeInfo, StakePosition};
