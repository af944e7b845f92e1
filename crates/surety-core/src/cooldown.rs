//! Withdrawal-timing policy.
//!
//! Not a storage entity: a pure function of the position, the configured
//! cooldown, and the current time, consulted by `withdraw` and exposed as
//! `is_withdrawable` for external query.

use crate::stake::StakePosition;

/// True when `withdraw` would pass the timing gate for this position.
///
/// Unverified positions withdraw freely. Verified positions need a prior
/// `request_unstake` whose cooldown has fully elapsed.
pub fn withdrawal_open(
    pos: &StakePosition,
    minimum_stake: u64,
    cooldown_secs: u64,
    now: u64,
) -> bool {
    if pos.amount == 0 {
        return false;
    }
    if !pos.verified(minimum_stake) {
        return true;
    }
    match pos.unstake_requested_at {
        Some(requested_at) => now >= requested_at.saturating_add(cooldown_secs),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(amount: u64, requested_at: Option<u64>) -> StakePosition {
        StakePosition {
            amount,
            staked_at: 100,
            unstake_requested_at: requested_at,
        }
    }

    #[test]
    fn empty_position_is_not_withdrawable() {
        assert!(!withdrawal_open(&pos(0, None), 1_000, 500, 10_000));
    }

    #[test]
    fn unverified_position_withdraws_freely() {
        assert!(withdrawal_open(&pos(999, None), 1_000, 500, 0));
    }

    #[test]
    fn verified_position_requires_request_then_cooldown() {
        let minimum = 1_000;
        assert!(!withdrawal_open(&pos(1_000, None), minimum, 500, 10_000));
        // Requested at t=100, cooldown 500 → open at t=600, not before.
        assert!(!withdrawal_open(&pos(1_000, Some(100)), minimum, 500, 599));
        assert!(withdrawal_open(&pos(1_000, Some(100)), minimum, 500, 600));
    }

    #[test]
    fn cooldown_near_u64_max_does_not_overflow() {
        assert!(!withdrawal_open(
            &pos(1_000, Some(u64::MAX - 10)),
            1_000,
            u64::MAX,
            u64::MAX,
        ));
    }
}
