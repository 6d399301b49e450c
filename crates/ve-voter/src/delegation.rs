//! Delegation of voting rights.
//!
//! Delegating hands the right to *cast* votes to another address; the lock
//! and its power stay with the delegator. A delegation may carry an `until`
//! timestamp before which it cannot be changed or removed, only extended.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use ve_core::error::VoteError;
use ve_core::traits::Clock;
use ve_core::types::{Address, Timestamp};

/// Current delegation of one account. `to == Address::ZERO` means none.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub to: Address,
    pub until: Timestamp,
}

impl Delegation {
    pub fn is_active(&self) -> bool {
        !self.to.is_zero()
    }
}

#[derive(Default)]
struct DelegationState {
    delegations: HashMap<Address, Delegation>,
    /// Delegate -> delegators, in delegation order.
    delegated: HashMap<Address, Vec<Address>>,
}

impl DelegationState {
    fn current(&self, account: &Address) -> Delegation {
        self.delegations.get(account).copied().unwrap_or_default()
    }

    fn ensure_unlocked(&self, account: &Address, now: Timestamp) -> Result<Delegation, VoteError> {
        let current = self.current(account);
        if now < current.until {
            return Err(VoteError::DelegationLocked { until: current.until });
        }
        Ok(current)
    }

    fn unlink(&mut self, account: &Address, from: &Address) {
        if let Some(list) = self.delegated.get_mut(from) {
            list.retain(|a| a != account);
            if list.is_empty() {
                self.delegated.remove(from);
            }
        }
    }
}

pub struct VoteDelegation {
    clock: Arc<dyn Clock>,
    state: RwLock<DelegationState>,
}

impl VoteDelegation {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, state: RwLock::new(DelegationState::default()) }
    }

    /// Delegate `caller`'s voting rights to `to`, replacing any unlocked
    /// delegation. `until == 0` leaves the delegation changeable at any time.
    pub fn delegate(&self, caller: &Address, to: Address, until: Timestamp) -> Result<(), VoteError> {
        if to.is_zero() {
            return Err(VoteError::InvalidDelegation("zero delegate"));
        }
        if to == *caller {
            return Err(VoteError::InvalidDelegation("self delegation"));
        }
        let mut state = self.state.write();
        let now = self.clock.now();
        let current = state.ensure_unlocked(caller, now)?;
        if current.is_active() {
            state.unlink(caller, &current.to);
        }
        state.delegations.insert(*caller, Delegation { to, until });
        state.delegated.entry(to).or_default().push(*caller);
        info!(account = %caller, %to, until, "voting rights delegated");
        Ok(())
    }

    pub fn remove_delegation(&self, caller: &Address) -> Result<(), VoteError> {
        let mut state = self.state.write();
        let now = self.clock.now();
        let current = state.ensure_unlocked(caller, now)?;
        if !current.is_active() {
            return Err(VoteError::InvalidDelegation("no delegation"));
        }
        state.unlink(caller, &current.to);
        state.delegations.remove(caller);
        info!(account = %caller, from = %current.to, "delegation removed");
        Ok(())
    }

    /// Push the lock-in time of the current delegation further out. Allowed
    /// while locked; `until` must be strictly later than the current one.
    pub fn increase_delegation_duration(&self, caller: &Address, until: Timestamp) -> Result<(), VoteError> {
        let mut state = self.state.write();
        let current = state.current(caller);
        if !current.is_active() {
            return Err(VoteError::InvalidDelegation("no delegation"));
        }
        if until <= current.until {
            return Err(VoteError::MustIncrease { current: current.until, requested: until });
        }
        state.delegations.insert(*caller, Delegation { until, ..current });
        info!(account = %caller, to = %current.to, until, "delegation extended");
        Ok(())
    }

    pub fn delegation(&self, account: &Address) -> Delegation {
        self.state.read().current(account)
    }

    pub fn delegate_of(&self, account: &Address) -> Option<Address> {
        let d = self.delegation(account);
        d.is_active().then_some(d.to)
    }

    /// Accounts currently delegating to `to`.
    pub fn get_delegated(&self, to: &Address) -> Vec<Address> {
        self.state.read().delegated.get(to).cloned().unwrap_or_default()
    }
}
