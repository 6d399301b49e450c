//! Vote/weight allocator.
//!
//! A holder splits its current voting power across targets in proportion to
//! the weights it submits. Every vote replaces the holder's previous
//! allocation in full. Targets the registry does not consider eligible
//! receive nothing, so weight parked on a removed vault is released on the
//! holder's next vote or poke.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ve_core::error::{MathError, VoteError};
use ve_core::math::{self, mul_div};
use ve_core::traits::{TargetRegistry, VotingPowerOracle};
use ve_core::types::{Address, Amount};

use crate::delegation::VoteDelegation;

/// The targets and relative weights of an account's last vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub targets: Vec<Address>,
    pub weights: Vec<u128>,
}

/// Per-target weight and its total.
#[derive(Clone, Default)]
struct Tally {
    weights: HashMap<Address, Amount>,
    total: Amount,
}

impl Tally {
    fn retract(&mut self, votes: &BTreeMap<Address, Amount>) -> Result<(), MathError> {
        for (target, amount) in votes {
            let left = math::sub(self.weights.get(target).copied().unwrap_or(0), *amount)?;
            if left == 0 {
                self.weights.remove(target);
            } else {
                self.weights.insert(*target, left);
            }
            self.total = math::sub(self.total, *amount)?;
        }
        Ok(())
    }

    fn cast(&mut self, votes: &BTreeMap<Address, Amount>) -> Result<(), MathError> {
        for (target, amount) in votes {
            let slot = self.weights.entry(*target).or_insert(0);
            *slot = math::add(*slot, *amount)?;
            self.total = math::add(self.total, *amount)?;
        }
        Ok(())
    }
}

/// One account's new allocation, computed before anything is committed.
struct Allocation {
    account: Address,
    power: Amount,
    votes: BTreeMap<Address, Amount>,
    used: Amount,
    ballot: Option<Ballot>,
}

#[derive(Default)]
struct VoterState {
    tally: Tally,
    used_weights: HashMap<Address, Amount>,
    votes: HashMap<Address, BTreeMap<Address, Amount>>,
    last_vote: HashMap<Address, Ballot>,
}

pub struct Voter {
    oracle: Arc<dyn VotingPowerOracle>,
    registry: Arc<dyn TargetRegistry>,
    delegation: Arc<VoteDelegation>,
    state: RwLock<VoterState>,
}

impl Voter {
    pub fn new(
        oracle: Arc<dyn VotingPowerOracle>,
        registry: Arc<dyn TargetRegistry>,
        delegation: Arc<VoteDelegation>,
    ) -> Self {
        Self { oracle, registry, delegation, state: RwLock::new(VoterState::default()) }
    }

    pub fn delegation(&self) -> &Arc<VoteDelegation> {
        &self.delegation
    }

    /// Replace `caller`'s allocation. Empty `targets` clears it.
    pub fn vote(&self, caller: &Address, targets: &[Address], weights: &[u128]) -> Result<(), VoteError> {
        self.vote_for(caller, &[*caller], targets, weights)
    }

    /// Cast the same ballot for several accounts at once. Each account must
    /// be `caller` or currently delegate to `caller`. Either every account's
    /// allocation is replaced or none is.
    pub fn vote_for(
        &self,
        caller: &Address,
        accounts: &[Address],
        targets: &[Address],
        weights: &[u128],
    ) -> Result<(), VoteError> {
        if targets.len() != weights.len() {
            return Err(VoteError::LengthMismatch { targets: targets.len(), weights: weights.len() });
        }
        for account in accounts {
            if account != caller && self.delegation.delegate_of(account) != Some(*caller) {
                return Err(VoteError::NotAuthorized(*account));
            }
        }
        let ballot = Ballot { targets: targets.to_vec(), weights: weights.to_vec() };

        let mut state = self.state.write();
        let allocations = accounts
            .iter()
            .map(|account| self.allocate(*account, &ballot))
            .collect::<Result<Vec<_>, _>>()?;
        Self::commit(&mut state, allocations)?;
        info!(%caller, accounts = accounts.len(), targets = targets.len(), "votes cast");
        Ok(())
    }

    /// Re-apply `account`'s last ballot against its current power. A no-op
    /// for accounts that have never voted or whose last vote was a clear.
    pub fn poke(&self, account: &Address) -> Result<(), VoteError> {
        let mut state = self.state.write();
        let Some(ballot) = state.last_vote.get(account).cloned() else {
            return Ok(());
        };
        let allocation = self.allocate(*account, &ballot)?;
        Self::commit(&mut state, vec![allocation])?;
        debug!(%account, "vote poked");
        Ok(())
    }

    /// `power * w_i / sum(w)` for each eligible target.
    fn allocate(&self, account: Address, ballot: &Ballot) -> Result<Allocation, VoteError> {
        if ballot.targets.is_empty() {
            return Ok(Allocation { account, power: 0, votes: BTreeMap::new(), used: 0, ballot: None });
        }
        let sum = ballot.weights.iter().try_fold(0u128, |acc, w| math::add(acc, *w))?;
        if sum == 0 {
            return Err(VoteError::ZeroWeight);
        }
        let power = self.oracle.balance_of(&account)?;
        if power == 0 {
            return Err(VoteError::InsufficientPower { available: 0, requested: sum });
        }

        let mut votes = BTreeMap::new();
        let mut used: Amount = 0;
        for (target, weight) in ballot.targets.iter().zip(&ballot.weights) {
            if *weight == 0 || !self.registry.is_eligible(target) {
                continue;
            }
            let amount = mul_div(power, *weight, sum)?;
            if amount == 0 {
                continue;
            }
            let slot = votes.entry(*target).or_insert(0);
            *slot = math::add(*slot, amount)?;
            used = math::add(used, amount)?;
        }
        debug!(%account, power, used, targets = votes.len(), "allocation computed");
        Ok(Allocation { account, power, votes, used, ballot: Some(ballot.clone()) })
    }

    /// Swap in the new allocations. The tally is rebuilt on a copy so an
    /// arithmetic failure leaves the stored state untouched.
    fn commit(state: &mut VoterState, allocations: Vec<Allocation>) -> Result<(), VoteError> {
        let mut tally = state.tally.clone();
        let mut replaced: HashMap<Address, &BTreeMap<Address, Amount>> = HashMap::new();
        for a in &allocations {
            if let Some(old) = replaced.insert(a.account, &a.votes) {
                tally.retract(old)?;
            } else if let Some(old) = state.votes.get(&a.account) {
                tally.retract(old)?;
            }
            tally.cast(&a.votes)?;
        }

        state.tally = tally;
        for a in allocations {
            debug!(account = %a.account, power = a.power, used = a.used, "vote committed");
            if a.used == 0 {
                state.used_weights.remove(&a.account);
            } else {
                state.used_weights.insert(a.account, a.used);
            }
            if a.votes.is_empty() {
                state.votes.remove(&a.account);
            } else {
                state.votes.insert(a.account, a.votes);
            }
            match a.ballot {
                Some(ballot) => state.last_vote.insert(a.account, ballot),
                None => state.last_vote.remove(&a.account),
            };
        }
        Ok(())
    }

    // --- views ---

    pub fn used_weights(&self, account: &Address) -> Amount {
        self.state.read().used_weights.get(account).copied().unwrap_or(0)
    }

    pub fn weights(&self, target: &Address) -> Amount {
        self.state.read().tally.weights.get(target).copied().unwrap_or(0)
    }

    pub fn total_weight(&self) -> Amount {
        self.state.read().tally.total
    }

    /// Weight `account` currently has on `target`.
    pub fn votes(&self, account: &Address, target: &Address) -> Amount {
        self.state
            .read()
            .votes
            .get(account)
            .and_then(|v| v.get(target))
            .copied()
            .unwrap_or(0)
    }

    pub fn last_vote(&self, account: &Address) -> Option<Ballot> {
        self.state.read().last_vote.get(account).cloned()
    }
}
