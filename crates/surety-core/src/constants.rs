// ============================================================================
// Protocol constants
// ============================================================================

// All collateral amounts are denominated in micro-credits (6 decimal places).
// 1 credit = 1_000_000 micro-credits.

/// One whole collateral credit in micro-credits.
pub const CREDIT: u64 = 1_000_000;

// --- Stake ------------------------------------------------------------------

/// Default minimum stake to earn verified status (10 credits).
pub const DEFAULT_MINIMUM_STAKE: u64 = 10_000_000;

/// Default withdrawal cooldown for verified agents (2 days).
pub const DEFAULT_UNSTAKE_COOLDOWN_SECS: u64 = 172_800;

// --- Claims -----------------------------------------------------------------

/// Default challenge window after claim submission (2 days).
pub const DEFAULT_CHALLENGE_PERIOD_SECS: u64 = 172_800;

/// Default protocol fee on slashed amounts (1%).
pub const DEFAULT_CLAIM_FEE_BPS: u32 = 100;

/// Hard cap on the claim fee: 1 000 bps = 10%.
pub const MAX_CLAIM_FEE_BPS: u32 = 1_000;

/// Basis-point denominator. fee = amount * bps / 10_000, truncating.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Maximum claim reason length accepted at the boundary.
pub const MAX_REASON_LEN: usize = 512;

// --- Audit ------------------------------------------------------------------

/// In-memory cap on the ledger event ring buffer.
pub const MAX_EVENT_BUFFER: usize = 10_000;
