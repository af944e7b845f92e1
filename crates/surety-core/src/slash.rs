//! Slashing arithmetic.
//!
//! The forfeited amount is capped at whatever collateral remains, the
//! protocol fee is taken in basis points with integer floor division, and
//! the remainder is paid out. `fee + payout == slashed` always.

use serde::{Deserialize, Serialize};

use crate::constants::BPS_DENOMINATOR;
use crate::id::AccountId;

/// Outcome of an approved claim, recorded on the claim itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Amount the resolution asked for (the claim amount).
    pub requested: u64,
    /// Amount actually forfeited: `min(requested, stake at resolution)`.
    /// May be below `requested` when earlier claims depleted the stake.
    pub slashed: u64,
    /// Protocol fee retained in custody.
    pub fee: u64,
    /// Amount transferred to the beneficiary.
    pub payout: u64,
    pub beneficiary: AccountId,
}

/// Split a slash between fee pool and beneficiary.
///
/// `fee = floor(amount * bps / 10_000)`, bit-exact integer math — never
/// floating point. The u128 intermediate cannot overflow for any u64 amount.
pub fn split_fee(amount: u64, fee_bps: u32) -> (u64, u64) {
    let fee = (amount as u128 * fee_bps as u128 / BPS_DENOMINATOR as u128) as u64;
    (fee, amount - fee)
}

/// Settle an approved claim against the available stake.
pub fn settle(
    requested: u64,
    available: u64,
    fee_bps: u32,
    beneficiary: AccountId,
) -> Settlement {
    let slashed = requested.min(available);
    let (fee, payout) = split_fee(slashed, fee_bps);
    Settlement {
        requested,
        slashed,
        fee,
        payout,
        beneficiary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BENEFICIARY: AccountId = AccountId([9; 32]);

    #[test]
    fn fee_is_floored() {
        // 1% of 501 = 5.01 → 5.
        assert_eq!(split_fee(501, 100), (5, 496));
        // 1% of 500 = exactly 5.
        assert_eq!(split_fee(500, 100), (5, 495));
        // Amounts too small to bear any fee pay none.
        assert_eq!(split_fee(99, 100), (0, 99));
    }

    #[test]
    fn fee_plus_payout_equals_amount() {
        for amount in [0u64, 1, 7, 499, 500, 501, 10_000, u64::MAX] {
            for bps in [0u32, 1, 100, 999, 1_000] {
                let (fee, payout) = split_fee(amount, bps);
                assert_eq!(fee + payout, amount);
            }
        }
    }

    #[test]
    fn max_fee_on_max_amount_does_not_overflow() {
        let (fee, payout) = split_fee(u64::MAX, 1_000);
        assert_eq!(fee, (u64::MAX as u128 * 1_000 / 10_000) as u64);
        assert_eq!(fee + payout, u64::MAX);
    }

    #[test]
    fn settlement_caps_at_available_stake() {
        let s = settle(1_000, 600, 100, BENEFICIARY);
        assert_eq!(s.requested, 1_000);
        assert_eq!(s.slashed, 600);
        assert_eq!(s.fee, 6);
        assert_eq!(s.payout, 594);
    }

    #[test]
    fn settlement_with_depleted_stake_is_zero() {
        let s = settle(1_000, 0, 100, BENEFICIARY);
        assert_eq!(s.slashed, 0);
        assert_eq!(s.fee, 0);
        assert_eq!(s.payout, 0);
    }
}
