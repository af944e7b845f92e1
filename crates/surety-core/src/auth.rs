//! Caller attribution and the agent-identity boundary.
//!
//! Authentication mechanics are out of scope for the core: every call
//! arrives already attributed to a [`Caller`]. Agent issuance and ownership
//! live in an external identity system, reached only through
//! [`AgentDirectory`].

use std::collections::HashMap;
use std::sync::RwLock;

use crate::id::{AccountId, AgentId};

/// Capability token accompanying every mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// A party acting from an external account (stake owner, claim submitter).
    Account(AccountId),
    /// The arbitration authority — the only caller allowed to resolve claims.
    Arbiter,
    /// Protocol administrator — parameters, fee sweeps, custody on-ramp.
    Admin,
}

impl Caller {
    pub fn account(&self) -> Option<AccountId> {
        match self {
            Caller::Account(a) => Some(*a),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin)
    }

    pub fn is_arbiter(&self) -> bool {
        matches!(self, Caller::Arbiter)
    }
}

/// Read-only view of the external identity system: which agents exist and
/// which account controls each of them.
pub trait AgentDirectory: Send + Sync {
    fn is_registered(&self, agent: &AgentId) -> bool;
    fn owner_of(&self, agent: &AgentId) -> Option<AccountId>;
}

/// In-memory directory. Stands in for the external registry in the service
/// and in tests; registration is glue performed outside the ledger.
#[derive(Default)]
pub struct MemoryDirectory {
    inner: RwLock<HashMap<AgentId, AccountId>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `agent` to its controlling account. Returns false when the agent
    /// was already registered (the binding is replaced either way).
    pub fn register(&self, agent: AgentId, owner: AccountId) -> bool {
        self.inner.write().unwrap().insert(agent, owner).is_none()
    }

    pub fn bindings(&self) -> Vec<(AgentId, AccountId)> {
        self.inner
            .read()
            .unwrap()
            .iter()
            .map(|(a, o)| (*a, *o))
            .collect()
    }
}

impl AgentDirectory for MemoryDirectory {
    fn is_registered(&self, agent: &AgentId) -> bool {
        self.inner.read().unwrap().contains_key(agent)
    }

    fn owner_of(&self, agent: &AgentId) -> Option<AccountId> {
        self.inner.read().unwrap().get(agent).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_look_up_owner() {
        let dir = MemoryDirectory::new();
        let agent = AgentId([1; 32]);
        let owner = AccountId([2; 32]);

        assert!(!dir.is_registered(&agent));
        assert!(dir.register(agent, owner));
        assert_eq!(dir.owner_of(&agent), Some(owner));

        // Re-registration replaces the binding and reports it existed.
        let other = AccountId([3; 32]);
        assert!(!dir.register(agent, other));
        assert_eq!(dir.owner_of(&agent), Some(other));
    }
}
