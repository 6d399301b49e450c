//! Weekly reward pool for lockers.
//!
//! Tokens burned into the pool, or received as early-exit penalties, are
//! credited to the week containing the current time. Once a week has fully
//! elapsed, each locker may claim a share of that week's tokens proportional
//! to its voting power at the week start.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use ve_core::constants::{floor_week, MAX_CLAIM_WEEKS, WEEK};
use ve_core::error::RewardError;
use ve_core::math::{self, mul_div};
use ve_core::traits::{Clock, FungibleToken, PenaltySink, VotingPowerOracle};
use ve_core::types::{Address, Amount, Timestamp};

struct PoolState {
    start_week: Timestamp,
    tokens_per_week: BTreeMap<Timestamp, Amount>,
    /// First week each account has not yet claimed.
    cursors: HashMap<Address, Timestamp>,
    total_received: Amount,
    total_claimed: Amount,
}

pub struct RewardPool {
    address: Address,
    token: Arc<dyn FungibleToken>,
    oracle: Arc<dyn VotingPowerOracle>,
    clock: Arc<dyn Clock>,
    state: RwLock<PoolState>,
}

impl RewardPool {
    pub fn new(
        address: Address,
        token: Arc<dyn FungibleToken>,
        oracle: Arc<dyn VotingPowerOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let start_week = floor_week(clock.now());
        let state = PoolState {
            start_week,
            tokens_per_week: BTreeMap::new(),
            cursors: HashMap::new(),
            total_received: 0,
            total_claimed: 0,
        };
        info!(%address, start_week, "reward pool created");
        Self { address, token, oracle, clock, state: RwLock::new(state) }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Move `amount` from `funder` into the pool, credited to this week.
    pub fn burn(&self, funder: &Address, amount: Amount) -> Result<(), RewardError> {
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let mut state = self.state.write();
        let week = floor_week(self.clock.now());
        let credited = math::add(state.tokens_per_week.get(&week).copied().unwrap_or(0), amount)?;
        let received = math::add(state.total_received, amount)?;
        self.token.transfer(funder, &self.address, amount)?;
        state.tokens_per_week.insert(week, credited);
        state.total_received = received;
        info!(%funder, amount, week, "tokens burned into reward pool");
        Ok(())
    }

    pub fn claim(&self, account: &Address) -> Result<Amount, RewardError> {
        self.claim_for(account, account)
    }

    /// Pay `account` its share of every funded week that has fully elapsed
    /// since its last claim, at most `MAX_CLAIM_WEEKS` funded weeks per call.
    /// Anyone may trigger a claim; proceeds always go to `account`.
    pub fn claim_for(&self, caller: &Address, account: &Address) -> Result<Amount, RewardError> {
        let mut state = self.state.write();
        let current = floor_week(self.clock.now());
        let cursor = state.cursors.get(account).copied().unwrap_or(state.start_week);
        if cursor >= current {
            return Ok(0);
        }

        let mut total: Amount = 0;
        let mut processed = 0usize;
        let mut next = current;
        for (&week, &tokens) in state.tokens_per_week.range(cursor..current) {
            if processed == MAX_CLAIM_WEEKS as usize {
                next = week;
                break;
            }
            processed += 1;
            let balance = self.oracle.balance_of_at_time(account, week)?;
            if balance == 0 {
                continue;
            }
            let supply = self.oracle.total_supply_at_time(week)?;
            if supply > 0 {
                total = math::add(total, mul_div(tokens, balance, supply)?)?;
            }
        }

        let claimed = math::add(state.total_claimed, total)?;
        if total > 0 {
            self.token.transfer(&self.address, account, total)?;
        }
        state.cursors.insert(*account, next);
        state.total_claimed = claimed;
        debug!(%caller, %account, amount = total, weeks = processed, cursor = next, "reward pool claim");
        Ok(total)
    }

    /// Tokens credited to the week containing `ts`.
    pub fn tokens_per_week(&self, ts: Timestamp) -> Amount {
        self.state.read().tokens_per_week.get(&floor_week(ts)).copied().unwrap_or(0)
    }

    pub fn start_week(&self) -> Timestamp {
        self.state.read().start_week
    }

    /// First unclaimed week of `account`.
    pub fn cursor_of(&self, account: &Address) -> Timestamp {
        let state = self.state.read();
        state.cursors.get(account).copied().unwrap_or(state.start_week)
    }

    pub fn total_received(&self) -> Amount {
        self.state.read().total_received
    }

    pub fn total_claimed(&self) -> Amount {
        self.state.read().total_claimed
    }

    /// Weeks that have fully elapsed and carry tokens, oldest first.
    pub fn funded_weeks(&self) -> Vec<(Timestamp, Amount)> {
        let current = floor_week(self.clock.now());
        self.state.read().tokens_per_week.range(..current).map(|(w, a)| (*w, *a)).collect()
    }
}

impl PenaltySink for RewardPool {
    fn address(&self) -> Address {
        self.address
    }

    fn receive_penalty(&self, from: &Address, amount: Amount) {
        if amount == 0 {
            return;
        }
        let mut state = self.state.write();
        let week = floor_week(self.clock.now());
        let slot = state.tokens_per_week.entry(week).or_insert(0);
        *slot = slot.saturating_add(amount);
        state.total_received = state.total_received.saturating_add(amount);
        info!(%from, amount, week, next_week = week + WEEK, "penalty credited to reward pool");
    }
}
