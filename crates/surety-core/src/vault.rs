//! Custody book: external account balances, the custodial balance held by
//! the ledger, and the sum of recorded stakes.
//!
//! The protocol fee pool is never a stored field. It is always
//! `custodial - total_staked`, recomputed at call time, so an administrative
//! sweep can never touch staked funds.

use std::collections::HashMap;

use crate::error::LedgerError;
use crate::id::AccountId;

#[derive(Debug, Default)]
pub struct Vault {
    /// Balances of external controlling accounts (micro-credits).
    accounts: HashMap<AccountId, u64>,
    /// Total held in custody: stakes plus accrued fees.
    custodial: u64,
    /// Sum of all recorded stake amounts. Invariant: `custodial >= total_staked`.
    total_staked: u64,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(
        accounts: HashMap<AccountId, u64>,
        custodial: u64,
        total_staked: u64,
    ) -> Result<Self, LedgerError> {
        if custodial < total_staked {
            return Err(LedgerError::InconsistentCustody {
                custodial,
                total_staked,
            });
        }
        Ok(Self {
            accounts,
            custodial,
            total_staked,
        })
    }

    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    pub fn custodial_balance(&self) -> u64 {
        self.custodial
    }

    pub fn total_staked(&self) -> u64 {
        self.total_staked
    }

    /// Surplus available to an administrative fee sweep.
    pub fn fee_surplus(&self) -> u64 {
        self.custodial - self.total_staked
    }

    pub fn accounts(&self) -> Vec<(AccountId, u64)> {
        self.accounts.iter().map(|(a, b)| (*a, *b)).collect()
    }

    /// Credit an external account (custody on-ramp). Returns the new balance.
    pub fn credit(&mut self, account: AccountId, amount: u64) -> Result<u64, LedgerError> {
        let entry = self.accounts.entry(account).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        Ok(*entry)
    }

    /// Move `amount` from `owner`'s external account into custody as stake.
    pub fn stake_in(&mut self, owner: &AccountId, amount: u64) -> Result<(), LedgerError> {
        let available = self.balance_of(owner);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                available,
                required: amount,
            });
        }
        let custodial = self
            .custodial
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        let total_staked = self
            .total_staked
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        self.accounts.insert(*owner, available - amount);
        self.custodial = custodial;
        self.total_staked = total_staked;
        Ok(())
    }

    /// Return `amount` of stake from custody to `owner`'s external account.
    pub fn stake_out(&mut self, owner: &AccountId, amount: u64) -> Result<(), LedgerError> {
        // The caller validated `amount` against the position; the custody
        // invariant guarantees both subtractions are covered.
        let balance = self
            .balance_of(owner)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        self.custodial -= amount;
        self.total_staked -= amount;
        self.accounts.insert(*owner, balance);
        Ok(())
    }

    /// Apply a slash: `slashed` leaves the stake, `payout` leaves custody to
    /// the beneficiary, and the fee (`slashed - payout`) stays behind in the
    /// custodial surplus.
    pub fn slash_out(
        &mut self,
        beneficiary: &AccountId,
        slashed: u64,
        payout: u64,
    ) -> Result<(), LedgerError> {
        let balance = self
            .balance_of(beneficiary)
            .checked_add(payout)
            .ok_or(LedgerError::BalanceOverflow)?;
        self.total_staked -= slashed;
        self.custodial -= payout;
        self.accounts.insert(*beneficiary, balance);
        Ok(())
    }

    /// Sweep the entire fee surplus to `recipient`. Recomputes the surplus
    /// here rather than trusting any cached counter. Returns the amount swept.
    pub fn sweep_fees(&mut self, recipient: &AccountId) -> Result<u64, LedgerError> {
        let surplus = self.fee_surplus();
        if surplus == 0 {
            return Ok(0);
        }
        let balance = self
            .balance_of(recipient)
            .checked_add(surplus)
            .ok_or(LedgerError::BalanceOverflow)?;
        self.custodial -= surplus;
        self.accounts.insert(*recipient, balance);
        Ok(surplus)
    }
}
