//! Lock ledger: per-account locks and the global voting-power curve.
//!
//! Every mutation follows the same three steps under the write lock:
//! compute a [`Plan`] against the current state, run the fallible token
//! transfers, then commit the plan. A failure in the first two steps leaves
//! the ledger untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ve_core::constants::{
    floor_week, BPS, DEFAULT_EARLY_EXIT_MAX_PENALTY_BPS, DEFAULT_MAX_WALK_WEEKS, MAXTIME, WEEK,
};
use ve_core::error::{AccessError, LedgerError, MathError};
use ve_core::management::Management;
use ve_core::math;
use ve_core::traits::{Clock, FungibleToken, PenaltySink};
use ve_core::types::{Address, Amount, BlockNumber, LockedBalance, Point, Timestamp};

use crate::curve::{self, Walk};

/// Tunable ledger parameters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Longest lock allowed; later unlock times are clamped. Whole weeks.
    pub max_lock_time: u64,
    /// Iteration cap for the global checkpoint walk and for projections.
    pub max_walk_weeks: u32,
    /// Upper bound on the early-exit penalty, in basis points.
    pub early_exit_max_penalty_bps: u128,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_lock_time: MAXTIME,
            max_walk_weeks: DEFAULT_MAX_WALK_WEEKS,
            early_exit_max_penalty_bps: DEFAULT_EARLY_EXIT_MAX_PENALTY_BPS,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.max_lock_time == 0 || self.max_lock_time % WEEK != 0 {
            return Err(LedgerError::InvalidConfig("max_lock_time must be a positive multiple of WEEK"));
        }
        if self.max_walk_weeks == 0 {
            return Err(LedgerError::InvalidConfig("max_walk_weeks must be positive"));
        }
        if self.early_exit_max_penalty_bps > BPS {
            return Err(LedgerError::InvalidConfig("early_exit_max_penalty_bps above 10000"));
        }
        Ok(())
    }
}

/// Tokens returned by a withdrawal and the part kept as penalty.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Withdrawal {
    pub amount: Amount,
    pub penalty: Amount,
}

/// Progress made by one [`LockLedger::checkpoint`] call.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointOutcome {
    pub weeks_advanced: u32,
    pub caught_up: bool,
}

/// Which preconditions a lock mutation enforces on top of the common rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LockMode {
    Modify,
    Create,
    IncreaseAmount,
    IncreaseUnlockTime,
    DepositFor,
}

pub(crate) struct LedgerState {
    pub(crate) locked: HashMap<Address, LockedBalance>,
    pub(crate) supply: Amount,
    pub(crate) point_history: Vec<Point>,
    pub(crate) user_point_history: HashMap<Address, Vec<Point>>,
    pub(crate) slope_changes: BTreeMap<Timestamp, i128>,
    pub(crate) user_slope_changes: HashMap<Address, BTreeMap<Timestamp, i128>>,
    pub(crate) next_ve_contract: Option<Address>,
    penalty_sink: Option<Arc<dyn PenaltySink>>,
    management: Management,
}

impl LedgerState {
    fn lock_of(&self, account: &Address) -> LockedBalance {
        self.locked.get(account).copied().unwrap_or_default()
    }

    pub(crate) fn last_point(&self) -> Point {
        self.point_history.last().copied().unwrap_or_default()
    }

    pub(crate) fn is_migrated(&self) -> bool {
        self.next_ve_contract.is_some()
    }
}

struct UserPlan {
    account: Address,
    lock: LockedBalance,
    point: Point,
    changes: Vec<(Timestamp, i128)>,
}

/// All writes a mutation will make, computed before any side effect.
struct Plan {
    walk: Walk,
    /// Global point at `now`; `None` when the walk did not catch up.
    head: Option<Point>,
    global_changes: Vec<(Timestamp, i128)>,
    user: Option<UserPlan>,
}

/// The lock ledger and voting-power oracle.
pub struct LockLedger {
    pub(crate) config: LedgerConfig,
    address: Address,
    token: Arc<dyn FungibleToken>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) state: RwLock<LedgerState>,
}

impl LockLedger {
    /// Create an empty ledger holding `token`, with the genesis global point
    /// recorded at the clock's current time.
    pub fn new(
        config: LedgerConfig,
        token: Arc<dyn FungibleToken>,
        clock: Arc<dyn Clock>,
        address: Address,
        management: Address,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let management = Management::new(management)?;
        let genesis = Point { bias: 0, slope: 0, ts: clock.now(), blk: clock.block_number() };
        let state = LedgerState {
            locked: HashMap::new(),
            supply: 0,
            point_history: vec![genesis],
            user_point_history: HashMap::new(),
            slope_changes: BTreeMap::new(),
            user_slope_changes: HashMap::new(),
            next_ve_contract: None,
            penalty_sink: None,
            management,
        };
        info!(%address, token = %token.address(), max_lock_time = config.max_lock_time, "lock ledger created");
        Ok(Self { config, address, token, clock, state: RwLock::new(state) })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn token(&self) -> &Arc<dyn FungibleToken> {
        &self.token
    }

    // --- lock mutations ---

    /// Add `amount` and/or move the unlock time of `account`'s lock.
    ///
    /// `unlock_time == 0` keeps the current end. A requested unlock time is
    /// clamped to `now + max_lock_time` and floored to the week. Returns the
    /// lock as stored afterwards.
    pub fn modify_lock(
        &self,
        account: &Address,
        amount: Amount,
        unlock_time: Timestamp,
    ) -> Result<LockedBalance, LedgerError> {
        self.apply_lock(account, account, amount, unlock_time, LockMode::Modify)
    }

    /// Open a lock for an account that has none.
    pub fn create_lock(
        &self,
        account: &Address,
        amount: Amount,
        unlock_time: Timestamp,
    ) -> Result<LockedBalance, LedgerError> {
        self.apply_lock(account, account, amount, unlock_time, LockMode::Create)
    }

    pub fn increase_amount(&self, account: &Address, amount: Amount) -> Result<LockedBalance, LedgerError> {
        self.apply_lock(account, account, amount, 0, LockMode::IncreaseAmount)
    }

    pub fn increase_unlock_time(
        &self,
        account: &Address,
        unlock_time: Timestamp,
    ) -> Result<LockedBalance, LedgerError> {
        self.apply_lock(account, account, 0, unlock_time, LockMode::IncreaseUnlockTime)
    }

    /// Top up `account`'s active lock with tokens taken from `funder`.
    pub fn deposit_for(
        &self,
        funder: &Address,
        account: &Address,
        amount: Amount,
    ) -> Result<LockedBalance, LedgerError> {
        self.apply_lock(funder, account, amount, 0, LockMode::DepositFor)
    }

    fn apply_lock(
        &self,
        funder: &Address,
        account: &Address,
        amount: Amount,
        unlock_time: Timestamp,
        mode: LockMode,
    ) -> Result<LockedBalance, LedgerError> {
        let mut state = self.state.write();
        let now = self.clock.now();
        let blk = self.clock.block_number();
        if state.is_migrated() {
            return Err(LedgerError::Migrated);
        }

        let old = state.lock_of(account);
        match mode {
            LockMode::Modify => {}
            LockMode::Create => {
                if amount == 0 {
                    return Err(LedgerError::ZeroAmount);
                }
                if !old.is_empty() {
                    return Err(LedgerError::InvalidLock("lock already exists, withdraw first"));
                }
                if unlock_time == 0 {
                    return Err(LedgerError::InvalidLock("unlock time required"));
                }
            }
            LockMode::IncreaseAmount | LockMode::DepositFor => {
                if amount == 0 {
                    return Err(LedgerError::ZeroAmount);
                }
                if old.is_empty() {
                    return Err(LedgerError::InvalidLock("no existing lock"));
                }
            }
            LockMode::IncreaseUnlockTime => {
                if old.is_empty() {
                    return Err(LedgerError::InvalidLock("no existing lock"));
                }
            }
        }

        let new = self.next_lock(&old, amount, unlock_time, now)?;
        let supply = math::add(state.supply, amount)?;
        let plan = self.plan(&state, Some((*account, old, new)), now, blk)?;

        if amount > 0 {
            self.token.transfer(funder, &self.address, amount)?;
        }
        state.supply = supply;
        Self::commit(&mut state, plan);

        if old.is_empty() {
            info!(%account, amount, end = new.end, "lock created");
        } else {
            info!(%account, %funder, amount, end = new.end, locked = new.amount, "lock modified");
        }
        Ok(new)
    }

    /// Validate a mutation of `old` and return the resulting lock.
    fn next_lock(
        &self,
        old: &LockedBalance,
        amount: Amount,
        unlock_time: Timestamp,
        now: Timestamp,
    ) -> Result<LockedBalance, LedgerError> {
        if amount == 0 && unlock_time == 0 {
            return Err(LedgerError::InvalidLock("nothing to change"));
        }
        let mut new = *old;
        if amount > 0 {
            if old.is_expired(now) {
                return Err(LedgerError::InvalidLock("lock expired, withdraw old tokens first"));
            }
            new.amount = math::add(old.amount, amount)?;
        }
        if unlock_time > 0 {
            let end = floor_week(unlock_time.min(now.saturating_add(self.config.max_lock_time)));
            if end <= now {
                return Err(LedgerError::InvalidLock("unlock time must be in the future"));
            }
            if end < old.end {
                return Err(LedgerError::InvalidLock("can only increase lock duration"));
            }
            if new.amount == 0 {
                return Err(LedgerError::InvalidLock("no tokens to lock"));
            }
            if end == old.end && amount == 0 {
                return Err(LedgerError::InvalidLock("unlock time unchanged"));
            }
            new.end = end;
        } else if old.is_empty() {
            return Err(LedgerError::InvalidLock("unlock time required for a new lock"));
        }
        Ok(new)
    }

    /// Withdraw an expired lock (or any lock once migrated).
    pub fn withdraw(&self, account: &Address) -> Result<Withdrawal, LedgerError> {
        self.exit(account, false)
    }

    /// Withdraw before the unlock time, paying the early-exit penalty to the
    /// penalty recipient. Behaves like [`withdraw`](Self::withdraw) once the
    /// lock has expired.
    pub fn force_withdraw(&self, account: &Address) -> Result<Withdrawal, LedgerError> {
        self.exit(account, true)
    }

    fn exit(&self, account: &Address, early: bool) -> Result<Withdrawal, LedgerError> {
        let mut state = self.state.write();
        let now = self.clock.now();
        let blk = self.clock.block_number();

        let old = state.lock_of(account);
        if old.is_empty() {
            return Err(LedgerError::InvalidLock("nothing to withdraw"));
        }
        let active = old.is_active(now) && !state.is_migrated();
        if active && !early {
            return Err(LedgerError::LockActive { end: old.end, now });
        }

        let penalty = if active { self.early_exit_penalty(&old, now)? } else { 0 };
        let sink = match (penalty > 0, &state.penalty_sink) {
            (true, Some(sink)) => Some(Arc::clone(sink)),
            (true, None) => return Err(LedgerError::InvalidConfig("no penalty recipient")),
            (false, _) => None,
        };

        // An exited lock is empty: nothing constrains the next one.
        let new = LockedBalance::default();
        let supply = math::sub(state.supply, old.amount)?;
        let plan = self.plan(&state, Some((*account, old, new)), now, blk)?;

        let payout = old.amount - penalty;
        match &sink {
            Some(sink) => self
                .token
                .transfer_many(&self.address, &[(*account, payout), (sink.address(), penalty)])?,
            None => self.token.transfer(&self.address, account, payout)?,
        }
        state.supply = supply;
        Self::commit(&mut state, plan);
        drop(state);

        if let Some(sink) = sink {
            sink.receive_penalty(&self.address, penalty);
            info!(%account, amount = payout, penalty, "lock exited early");
        } else {
            info!(%account, amount = payout, "lock withdrawn");
        }
        Ok(Withdrawal { amount: payout, penalty })
    }

    /// `min(amount * time_left / max_lock_time, amount * cap / BPS)`.
    fn early_exit_penalty(&self, lock: &LockedBalance, now: Timestamp) -> Result<Amount, MathError> {
        let time_left = lock.end.saturating_sub(now) as u128;
        let pro_rata = math::mul_div(lock.amount, time_left, self.config.max_lock_time as u128)?;
        let cap = math::mul_div(lock.amount, self.config.early_exit_max_penalty_bps, BPS)?;
        Ok(pro_rata.min(cap))
    }

    /// Advance the global curve toward "now" without touching any lock.
    ///
    /// Walks at most `max_walk_weeks` weeks and commits the points it
    /// produced; repeat until `caught_up` to recover a stale ledger.
    pub fn checkpoint(&self) -> Result<CheckpointOutcome, LedgerError> {
        let mut state = self.state.write();
        let now = self.clock.now();
        let blk = self.clock.block_number();
        let plan = self.plan(&state, None, now, blk)?;
        let outcome = CheckpointOutcome { weeks_advanced: plan.walk.weeks, caught_up: plan.walk.caught_up };
        if !outcome.caught_up {
            warn!(weeks = outcome.weeks_advanced, "checkpoint capped, ledger still behind");
        }
        Self::commit(&mut state, plan);
        debug!(weeks = outcome.weeks_advanced, epoch = state.point_history.len() - 1, "global checkpoint");
        Ok(outcome)
    }

    fn plan(
        &self,
        state: &LedgerState,
        change: Option<(Address, LockedBalance, LockedBalance)>,
        now: Timestamp,
        blk: BlockNumber,
    ) -> Result<Plan, LedgerError> {
        let last = state.last_point();
        let walk = curve::walk(last, now, blk, &state.slope_changes, self.config.max_walk_weeks)?;
        let Some((account, old, new)) = change else {
            let head = walk.caught_up.then_some(walk.last);
            return Ok(Plan { walk, head, global_changes: Vec::new(), user: None });
        };
        if !walk.caught_up {
            let weeks_behind = (now.saturating_sub(last.ts)) / WEEK;
            warn!(weeks_behind, "lock mutation refused, global checkpoint stale");
            return Err(LedgerError::StaleCheckpoint { weeks_behind });
        }

        let (old_bias, old_slope) = curve::lock_point(&old, now)?;
        let (new_bias, new_slope) = curve::lock_point(&new, now)?;

        let mut head = walk.last;
        head.slope = head
            .slope
            .checked_add(new_slope)
            .and_then(|s| s.checked_sub(old_slope))
            .ok_or(MathError::Overflow)?
            .max(0);
        head.bias = head
            .bias
            .checked_add(new_bias)
            .and_then(|b| b.checked_sub(old_bias))
            .ok_or(MathError::Overflow)?
            .max(0);

        let global_changes = reschedule(&state.slope_changes, &old, &new, old_slope, new_slope, now)?;
        let empty = BTreeMap::new();
        let user_schedule = state.user_slope_changes.get(&account).unwrap_or(&empty);
        let user_changes = reschedule(user_schedule, &old, &new, old_slope, new_slope, now)?;

        debug!(%account, weeks = walk.weeks, bias = head.bias, slope = head.slope, "lock checkpoint");
        Ok(Plan {
            walk,
            head: Some(head),
            global_changes,
            user: Some(UserPlan {
                account,
                lock: new,
                point: Point { bias: new_bias, slope: new_slope, ts: now, blk },
                changes: user_changes,
            }),
        })
    }

    fn commit(state: &mut LedgerState, plan: Plan) {
        let Plan { walk, head, global_changes, user } = plan;
        state.point_history.extend(walk.history);
        if let Some(head) = head {
            match state.point_history.last_mut() {
                Some(last) if last.ts == head.ts => *last = head,
                _ => state.point_history.push(head),
            }
        }
        write_changes(&mut state.slope_changes, &global_changes);

        if let Some(user) = user {
            state.locked.insert(user.account, user.lock);
            state.user_point_history.entry(user.account).or_default().push(user.point);
            let schedule = state.user_slope_changes.entry(user.account).or_default();
            write_changes(schedule, &user.changes);
        }
    }

    // --- admin ---

    /// Route early-exit penalties to `sink`.
    pub fn set_penalty_recipient(&self, caller: &Address, sink: Arc<dyn PenaltySink>) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        state.management.ensure(caller)?;
        info!(recipient = %sink.address(), "penalty recipient set");
        state.penalty_sink = Some(sink);
        Ok(())
    }

    /// One-way migration switch: all power reads return zero afterwards and
    /// locks may be withdrawn early without penalty.
    pub fn set_next_ve_contract(&self, caller: &Address, next: Address) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        state.management.ensure(caller)?;
        if next.is_zero() {
            return Err(AccessError::ZeroAddress.into());
        }
        if state.is_migrated() {
            return Err(LedgerError::Migrated);
        }
        state.next_ve_contract = Some(next);
        warn!(%next, "ledger migrated, voting power disabled");
        Ok(())
    }

    pub fn set_management(&self, caller: &Address, new: Address) -> Result<(), LedgerError> {
        Ok(self.state.write().management.set_management(caller, new)?)
    }

    pub fn accept_management(&self, caller: &Address) -> Result<(), LedgerError> {
        Ok(self.state.write().management.accept_management(caller)?)
    }

    // --- state reads ---

    pub fn management(&self) -> Management {
        self.state.read().management
    }

    pub fn locked(&self, account: &Address) -> LockedBalance {
        self.state.read().lock_of(account)
    }

    /// Total tokens held in locks.
    pub fn supply(&self) -> Amount {
        self.state.read().supply
    }

    /// Index of the latest global point (genesis is 0).
    pub fn epoch(&self) -> usize {
        self.state.read().point_history.len().saturating_sub(1)
    }

    pub fn point_history(&self, idx: usize) -> Option<Point> {
        self.state.read().point_history.get(idx).copied()
    }

    /// Number of points recorded for `account`; points are indexed `1..=epoch`.
    pub fn user_point_epoch(&self, account: &Address) -> usize {
        self.state.read().user_point_history.get(account).map_or(0, Vec::len)
    }

    pub fn user_point_history(&self, account: &Address, idx: usize) -> Option<Point> {
        let state = self.state.read();
        let history = state.user_point_history.get(account)?;
        idx.checked_sub(1).and_then(|i| history.get(i)).copied()
    }

    pub fn slope_changes(&self, ts: Timestamp) -> i128 {
        curve::change_at(&self.state.read().slope_changes, ts)
    }

    pub fn user_slope_changes(&self, account: &Address, ts: Timestamp) -> i128 {
        self.state.read().user_slope_changes.get(account).map_or(0, |s| curve::change_at(s, ts))
    }

    pub fn next_ve_contract(&self) -> Option<Address> {
        self.state.read().next_ve_contract
    }
}

/// New schedule values at `old.end` and `new.end` after replacing `old` by `new`.
///
/// The old lock's removal is cancelled first, then the new one is installed,
/// so re-checkpointing the same lock leaves the schedule unchanged.
fn reschedule(
    schedule: &BTreeMap<Timestamp, i128>,
    old: &LockedBalance,
    new: &LockedBalance,
    old_slope: i128,
    new_slope: i128,
    now: Timestamp,
) -> Result<Vec<(Timestamp, i128)>, MathError> {
    let mut out = Vec::with_capacity(2);
    let mut old_dslope = curve::change_at(schedule, old.end);
    let mut new_dslope = if new.end == old.end { old_dslope } else { curve::change_at(schedule, new.end) };

    if old.end > now {
        old_dslope = old_dslope.checked_add(old_slope).ok_or(MathError::Overflow)?;
        if new.end == old.end {
            old_dslope = old_dslope.checked_sub(new_slope).ok_or(MathError::Overflow)?;
        }
        out.push((old.end, old_dslope));
    }
    if new.end > now && new.end > old.end {
        new_dslope = new_dslope.checked_sub(new_slope).ok_or(MathError::Overflow)?;
        out.push((new.end, new_dslope));
    }
    Ok(out)
}

fn write_changes(schedule: &mut BTreeMap<Timestamp, i128>, changes: &[(Timestamp, i128)]) {
    for &(ts, value) in changes {
        if value == 0 {
            schedule.remove(&ts);
        } else {
            schedule.insert(ts, value);
        }
    }
}
