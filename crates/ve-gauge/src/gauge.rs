//! Boosted reward gauge for one vault token.
//!
//! Rewards stream at `reward_rate` over a window of `duration` seconds and
//! accrue per unit of *raw* deposit (`reward_per_token`). A depositor is paid
//! on its boosted balance, measured from the voting-power oracle whenever its
//! position changes, it claims, or someone kicks it. The gap between what the
//! raw balance accrued and what the boosted balance earned is forfeited to
//! `queued_penalty`, which [`Gauge::transfer_queued_penalty`] sweeps to the
//! lockers' reward pool under either [`BoostPolicy`].
//!
//! Management can attach extra reward tokens (see [`crate::extra`]). They
//! stream on their own windows and are paid with every claim.
//!
//! `reward_rate` and `reward_per_token` carry [`REWARD_PRECISION`] fixed-point
//! scaling.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ve_core::constants::{BPS, DEFAULT_QUEUE_THRESHOLD_BPS, DEFAULT_REWARD_DURATION, REWARD_PRECISION};
use ve_core::error::{MathError, RewardError};
use ve_core::management::Management;
use ve_core::math::{self, mul_div};
use ve_core::traits::{Clock, FungibleToken, LockEscrow, PenaltySink, VotingPowerOracle};
use ve_core::types::{Address, Amount, Capabilities, Timestamp};

use crate::boost::BoostPolicy;
use crate::extra::{ExtraAccrual, ExtraPosition, ExtraReward, ExtraRewardInfo};

/// Tunable gauge parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct GaugeConfig {
    /// Length of a reward window in seconds.
    pub duration: u64,
    /// A top-up during an active window below this share of the undistributed
    /// remainder is deferred to `queued_rewards`.
    pub queue_threshold_bps: u128,
    pub boost: BoostPolicy,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_REWARD_DURATION,
            queue_threshold_bps: DEFAULT_QUEUE_THRESHOLD_BPS,
            boost: BoostPolicy::default(),
        }
    }
}

impl GaugeConfig {
    pub fn validate(&self) -> Result<(), RewardError> {
        if self.duration == 0 {
            return Err(RewardError::InvalidParameter("duration must be positive"));
        }
        if self.queue_threshold_bps == 0 {
            return Err(RewardError::InvalidParameter("queue threshold must be positive"));
        }
        self.boost.validate()
    }
}

/// Handles to the shared collaborators a gauge works against.
#[derive(Clone)]
pub struct GaugeContext {
    pub clock: Arc<dyn Clock>,
    pub oracle: Arc<dyn VotingPowerOracle>,
    /// Receives claim-as-lock payouts; its locked token must be the reward token.
    pub escrow: Arc<dyn LockEscrow>,
    pub reward_token: Arc<dyn FungibleToken>,
    pub penalty_sink: Arc<dyn PenaltySink>,
}

/// Per-account position in a gauge.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Depositor {
    pub balance: Amount,
    pub boosted: Amount,
    pub reward_per_token_paid: u128,
    pub rewards: Amount,
}

/// What [`Gauge::queue_new_rewards`] did with the funds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueueOutcome {
    Started { reward_rate: u128, period_finish: Timestamp },
    Deferred { queued_rewards: Amount },
}

/// Global accrual scalars, advanced to "now" before any position changes.
#[derive(Clone, Copy, Debug)]
struct Accrual {
    reward_per_token_stored: u128,
    last_update_time: Timestamp,
    queued_rewards: Amount,
    queued_penalty: Amount,
}

impl Accrual {
    /// Credit `d` with everything accrued since its last settlement. The
    /// unboosted share is forfeited to the penalty queue.
    fn settle(&mut self, d: &mut Depositor) -> Result<(), MathError> {
        let delta = math::sub(self.reward_per_token_stored, d.reward_per_token_paid)?;
        let earned = mul_div(d.boosted, delta, REWARD_PRECISION)?;
        let full = mul_div(d.balance, delta, REWARD_PRECISION)?;
        d.rewards = math::add(d.rewards, earned)?;
        d.reward_per_token_paid = self.reward_per_token_stored;
        self.queued_penalty = math::add(self.queued_penalty, full.saturating_sub(earned))?;
        Ok(())
    }
}

/// Extra streams advanced to "now", index-aligned with `GaugeState::extras`.
struct ExtraSettlement {
    accruals: Vec<ExtraAccrual>,
    positions: Vec<(Address, Vec<ExtraPosition>)>,
}

impl ExtraSettlement {
    /// Settle `account` on every stream and return its index in `positions`.
    fn settle(&mut self, extras: &[ExtraReward], account: &Address, d: &Depositor) -> Result<usize, MathError> {
        let mut row = Vec::with_capacity(extras.len());
        for (extra, acc) in extras.iter().zip(self.accruals.iter_mut()) {
            let mut p = extra.position(account);
            acc.settle(&mut p, d)?;
            row.push(p);
        }
        self.positions.push((*account, row));
        Ok(self.positions.len() - 1)
    }

    /// Zero the rewards of settled row `idx`, returning what each stream owes.
    fn take_rewards(&mut self, idx: usize) -> Vec<Amount> {
        self.positions[idx].1.iter_mut().map(|p| std::mem::take(&mut p.rewards)).collect()
    }
}

/// Decide what funding a stream with `amount` does: start a fresh window, or
/// defer into `queued` when a window is active and the top-up is below
/// `queue_threshold_bps` of the undistributed remainder. A started window
/// spreads the remainder, the top-up and the queue, and clears the queue.
pub(crate) fn plan_window(
    config: &GaugeConfig,
    reward_rate: u128,
    period_finish: Timestamp,
    queued: &mut Amount,
    amount: Amount,
    now: Timestamp,
) -> Result<QueueOutcome, MathError> {
    let to_spread = if now >= period_finish {
        Some(math::add(amount, *queued)?)
    } else {
        let remaining = (period_finish - now) as u128;
        let undistributed = mul_div(reward_rate, remaining, REWARD_PRECISION)?;
        let threshold = mul_div(undistributed, config.queue_threshold_bps, BPS)?;
        if amount < threshold {
            None
        } else {
            Some(math::add(math::add(undistributed, amount)?, *queued)?)
        }
    };

    Ok(match to_spread {
        None => {
            *queued = math::add(*queued, amount)?;
            QueueOutcome::Deferred { queued_rewards: *queued }
        }
        Some(total) => {
            *queued = 0;
            QueueOutcome::Started {
                reward_rate: mul_div(total, REWARD_PRECISION, config.duration as u128)?,
                period_finish: now.saturating_add(config.duration),
            }
        }
    })
}

struct GaugeState {
    config: GaugeConfig,
    reward_rate: u128,
    period_finish: Timestamp,
    last_update_time: Timestamp,
    reward_per_token_stored: u128,
    queued_rewards: Amount,
    queued_penalty: Amount,
    total_supply: Amount,
    depositors: HashMap<Address, Depositor>,
    approvals: HashMap<(Address, Address), Capabilities>,
    extras: Vec<ExtraReward>,
    management: Management,
}

impl GaugeState {
    fn depositor(&self, account: &Address) -> Depositor {
        self.depositors.get(account).copied().unwrap_or_default()
    }

    fn last_time_reward_applicable(&self, now: Timestamp) -> Timestamp {
        now.min(self.period_finish)
    }

    fn reward_per_token(&self, now: Timestamp) -> Result<u128, MathError> {
        if self.total_supply == 0 {
            return Ok(self.reward_per_token_stored);
        }
        let dt = self.last_time_reward_applicable(now).saturating_sub(self.last_update_time);
        let accrued = mul_div(dt as u128, self.reward_rate, self.total_supply)?;
        math::add(self.reward_per_token_stored, accrued)
    }

    fn accrual(&self, now: Timestamp) -> Result<Accrual, MathError> {
        Ok(Accrual {
            reward_per_token_stored: self.reward_per_token(now)?,
            last_update_time: self.last_time_reward_applicable(now).max(self.last_update_time),
            queued_rewards: self.queued_rewards,
            queued_penalty: self.queued_penalty,
        })
    }

    fn commit(&mut self, acc: Accrual, updates: impl IntoIterator<Item = (Address, Depositor)>) {
        self.reward_per_token_stored = acc.reward_per_token_stored;
        self.last_update_time = acc.last_update_time;
        self.queued_rewards = acc.queued_rewards;
        self.queued_penalty = acc.queued_penalty;
        for (account, d) in updates {
            if d == Depositor::default() {
                self.depositors.remove(&account);
            } else {
                self.depositors.insert(account, d);
            }
        }
    }

    fn capabilities(&self, owner: &Address, operator: &Address) -> Capabilities {
        self.approvals.get(&(*owner, *operator)).copied().unwrap_or_default()
    }

    /// Advance every extra stream over the current raw supply.
    fn extra_settlement(&self, now: Timestamp) -> Result<ExtraSettlement, MathError> {
        let accruals = self
            .extras
            .iter()
            .map(|e| e.accrual(now, self.total_supply))
            .collect::<Result<_, _>>()?;
        Ok(ExtraSettlement { accruals, positions: Vec::new() })
    }

    /// Apply after [`commit`](Self::commit): a position with no deposit and
    /// nothing owed is dropped.
    fn commit_extras(&mut self, settlement: ExtraSettlement) {
        let ExtraSettlement { accruals, mut positions } = settlement;
        for (account, row) in positions.iter_mut() {
            if !self.depositors.contains_key(account) {
                row.iter_mut().filter(|p| p.rewards == 0).for_each(|p| *p = ExtraPosition::default());
            }
        }
        for (i, (extra, acc)) in self.extras.iter_mut().zip(accruals).enumerate() {
            extra.commit(acc, positions.iter().map(|(account, row)| (*account, row[i])));
        }
    }

    fn extra(&self, token: &Address) -> Option<usize> {
        self.extras.iter().position(|e| e.address() == *token)
    }
}

/// A reward gauge for one vault token.
pub struct Gauge {
    address: Address,
    vault: Arc<dyn FungibleToken>,
    ctx: GaugeContext,
    state: RwLock<GaugeState>,
}

impl Gauge {
    pub fn new(
        address: Address,
        vault: Arc<dyn FungibleToken>,
        config: GaugeConfig,
        ctx: GaugeContext,
        management: Address,
    ) -> Result<Self, RewardError> {
        config.validate()?;
        let management = Management::new(management)?;
        let state = GaugeState {
            config,
            reward_rate: 0,
            period_finish: 0,
            last_update_time: 0,
            reward_per_token_stored: 0,
            queued_rewards: 0,
            queued_penalty: 0,
            total_supply: 0,
            depositors: HashMap::new(),
            approvals: HashMap::new(),
            extras: Vec::new(),
            management,
        };
        Ok(Self { address, vault, ctx, state: RwLock::new(state) })
    }

    /// Boosted balance of `account` for a raw `balance` in a gauge of `gauge_total`.
    fn measure(
        &self,
        policy: &BoostPolicy,
        account: &Address,
        balance: Amount,
        gauge_total: Amount,
    ) -> Result<Amount, RewardError> {
        if balance == 0 {
            return Ok(0);
        }
        let ve_balance = self.ctx.oracle.balance_of(account)?;
        let ve_total = self.ctx.oracle.total_supply()?;
        Ok(policy.boosted_balance(balance, gauge_total, ve_balance, ve_total)?)
    }

    /// Send `reward` to `account`, either as tokens or into its lock.
    fn pay(&self, account: &Address, reward: Amount, lock: bool) -> Result<(), RewardError> {
        if reward == 0 {
            return Ok(());
        }
        if lock {
            self.ctx.escrow.deposit_for(&self.address, account, reward)?;
        } else {
            self.ctx.reward_token.transfer(&self.address, account, reward)?;
        }
        Ok(())
    }

    /// Pay settled extra rewards. Cannot fail while each stream holds what it owes.
    fn pay_extras(&self, state: &GaugeState, account: &Address, owed: &[Amount]) -> Result<(), RewardError> {
        for (extra, amount) in state.extras.iter().zip(owed) {
            if *amount > 0 {
                extra.token().transfer(&self.address, account, *amount)?;
                info!(gauge = %self.address, %account, token = %extra.address(), amount, "extra reward paid");
            }
        }
        Ok(())
    }

    // --- positions ---

    /// Deposit `amount` vault tokens from `caller`, credited to `on_behalf_of`
    /// (default: the caller). Crediting another account requires its
    /// `can_deposit_for` approval of the caller.
    pub fn deposit(&self, caller: &Address, amount: Amount, on_behalf_of: Option<Address>) -> Result<(), RewardError> {
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let account = on_behalf_of.unwrap_or(*caller);
        let mut state = self.state.write();
        let now = self.ctx.clock.now();
        if account != *caller && !state.capabilities(&account, caller).can_deposit_for {
            return Err(RewardError::NotAuthorized("deposit"));
        }

        let mut acc = state.accrual(now)?;
        let mut extras = state.extra_settlement(now)?;
        let mut d = state.depositor(&account);
        acc.settle(&mut d)?;
        extras.settle(&state.extras, &account, &d)?;
        d.balance = math::add(d.balance, amount)?;
        let total = math::add(state.total_supply, amount)?;
        d.boosted = self.measure(&state.config.boost, &account, d.balance, total)?;

        self.vault.transfer(caller, &self.address, amount)?;
        state.total_supply = total;
        state.commit(acc, [(account, d)]);
        state.commit_extras(extras);
        info!(gauge = %self.address, %account, amount, boosted = d.boosted, "deposit");
        Ok(())
    }

    /// Withdraw `amount` of the caller's deposit, optionally claiming rewards
    /// (as tokens, or into the caller's lock) along with any extra rewards.
    /// Returns the main reward paid.
    pub fn withdraw(&self, caller: &Address, amount: Amount, claim: bool, lock: bool) -> Result<Amount, RewardError> {
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let mut state = self.state.write();
        let now = self.ctx.clock.now();

        let mut acc = state.accrual(now)?;
        let mut d = state.depositor(caller);
        if d.balance < amount {
            return Err(RewardError::InsufficientDeposit { have: d.balance, need: amount });
        }
        let mut extras = state.extra_settlement(now)?;
        acc.settle(&mut d)?;
        let row = extras.settle(&state.extras, caller, &d)?;
        d.balance -= amount;
        let total = math::sub(state.total_supply, amount)?;
        d.boosted = self.measure(&state.config.boost, caller, d.balance, total)?;
        let reward = if claim { std::mem::take(&mut d.rewards) } else { 0 };
        let owed = if claim { extras.take_rewards(row) } else { Vec::new() };

        // The vault transfer cannot fail while the gauge holds `total_supply`.
        self.pay(caller, reward, lock)?;
        self.pay_extras(&state, caller, &owed)?;
        self.vault.transfer(&self.address, caller, amount)?;
        state.total_supply = total;
        state.commit(acc, [(*caller, d)]);
        state.commit_extras(extras);
        info!(gauge = %self.address, account = %caller, amount, reward, "withdraw");
        Ok(reward)
    }

    /// Withdraw the caller's whole deposit.
    pub fn withdraw_all(&self, caller: &Address, claim: bool, lock: bool) -> Result<Amount, RewardError> {
        let balance = self.balance_of(caller);
        self.withdraw(caller, balance, claim, lock)
    }

    /// Claim the caller's rewards, as tokens or into its lock.
    pub fn get_reward(&self, caller: &Address, claim_as_lock: bool) -> Result<Amount, RewardError> {
        self.get_reward_for(caller, caller, claim_as_lock)
    }

    /// Claim `account`'s rewards on its behalf. Rewards always go to
    /// `account`; a third-party caller needs `can_claim_for`, and
    /// `can_lock_for` as well when locking. Extra rewards are paid as tokens
    /// either way. Returns the main reward paid.
    pub fn get_reward_for(&self, caller: &Address, account: &Address, claim_as_lock: bool) -> Result<Amount, RewardError> {
        let mut state = self.state.write();
        let now = self.ctx.clock.now();
        if caller != account {
            let caps = state.capabilities(account, caller);
            if !caps.can_claim_for {
                return Err(RewardError::NotAuthorized("claim"));
            }
            if claim_as_lock && !caps.can_lock_for {
                return Err(RewardError::NotAuthorized("lock"));
            }
        }

        let mut acc = state.accrual(now)?;
        let mut extras = state.extra_settlement(now)?;
        let mut d = state.depositor(account);
        acc.settle(&mut d)?;
        let row = extras.settle(&state.extras, account, &d)?;
        d.boosted = self.measure(&state.config.boost, account, d.balance, state.total_supply)?;
        let reward = std::mem::take(&mut d.rewards);
        let owed = extras.take_rewards(row);

        self.pay(account, reward, claim_as_lock)?;
        self.pay_extras(&state, account, &owed)?;
        state.commit(acc, [(*account, d)]);
        state.commit_extras(extras);
        if reward > 0 {
            info!(gauge = %self.address, %account, reward, locked = claim_as_lock, "reward paid");
        }
        Ok(reward)
    }

    /// Re-measure the boost of each listed account. Returns how many boosts changed.
    pub fn kick(&self, accounts: &[Address]) -> Result<usize, RewardError> {
        let mut state = self.state.write();
        let now = self.ctx.clock.now();
        let mut acc = state.accrual(now)?;
        let mut extras = state.extra_settlement(now)?;
        let mut seen = HashSet::new();
        let mut updates = Vec::new();
        let mut changed = 0;
        for account in accounts {
            if !seen.insert(*account) {
                continue;
            }
            let mut d = state.depositor(account);
            if d.balance == 0 {
                continue;
            }
            acc.settle(&mut d)?;
            extras.settle(&state.extras, account, &d)?;
            let fresh = self.measure(&state.config.boost, account, d.balance, state.total_supply)?;
            if fresh != d.boosted {
                warn!(gauge = %self.address, %account, stale = d.boosted, fresh, "kicked stale boost");
                d.boosted = fresh;
                changed += 1;
            }
            updates.push((*account, d));
        }
        state.commit(acc, updates);
        state.commit_extras(extras);
        Ok(changed)
    }

    // --- rewards ---

    /// Fund the gauge with `amount` reward tokens from `caller`.
    ///
    /// Starts a new window when none is active. During an active window a
    /// top-up smaller than `queue_threshold_bps` of the undistributed
    /// remainder is only queued; a larger one restarts the window with
    /// remainder, top-up and queue spread over a fresh `duration`.
    pub fn queue_new_rewards(&self, caller: &Address, amount: Amount) -> Result<QueueOutcome, RewardError> {
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let mut state = self.state.write();
        let now = self.ctx.clock.now();
        let mut acc = state.accrual(now)?;
        let outcome = plan_window(
            &state.config,
            state.reward_rate,
            state.period_finish,
            &mut acc.queued_rewards,
            amount,
            now,
        )?;

        self.ctx.reward_token.transfer(caller, &self.address, amount)?;
        if let QueueOutcome::Started { reward_rate, period_finish } = outcome {
            acc.last_update_time = now;
            state.reward_rate = reward_rate;
            state.period_finish = period_finish;
            info!(gauge = %self.address, amount, reward_rate, period_finish, "reward window started");
        } else {
            warn!(gauge = %self.address, amount, queued = acc.queued_rewards, "small top-up deferred");
        }
        state.commit(acc, []);
        Ok(outcome)
    }

    /// Sweep accumulated penalties to the penalty sink. Returns the amount moved.
    pub fn transfer_queued_penalty(&self) -> Result<Amount, RewardError> {
        let mut state = self.state.write();
        let amount = state.queued_penalty;
        if amount == 0 {
            return Ok(0);
        }
        let sink = Arc::clone(&self.ctx.penalty_sink);
        self.ctx.reward_token.transfer(&self.address, &sink.address(), amount)?;
        state.queued_penalty = 0;
        drop(state);
        sink.receive_penalty(&self.address, amount);
        info!(gauge = %self.address, amount, "queued penalty swept");
        Ok(amount)
    }

    // --- extra rewards ---

    /// Attach an extra reward stream paying `token`.
    pub fn add_extra_reward(&self, caller: &Address, token: Arc<dyn FungibleToken>) -> Result<(), RewardError> {
        let mut state = self.state.write();
        state.management.ensure(caller)?;
        let address = token.address();
        if address == self.vault.address() || address == self.ctx.reward_token.address() {
            return Err(RewardError::InvalidParameter("extra reward token must differ from vault and reward token"));
        }
        if state.extra(&address).is_some() {
            return Err(RewardError::ExtraRewardExists(address));
        }
        state.extras.push(ExtraReward::new(token));
        info!(gauge = %self.address, token = %address, "extra reward added");
        Ok(())
    }

    /// Detach the stream paying `token`. What it still owes stays in the
    /// gauge and becomes sweepable.
    pub fn remove_extra_reward(&self, caller: &Address, token: &Address) -> Result<(), RewardError> {
        let mut state = self.state.write();
        state.management.ensure(caller)?;
        let idx = state.extra(token).ok_or(RewardError::UnknownExtraReward(*token))?;
        state.extras.remove(idx);
        info!(gauge = %self.address, %token, "extra reward removed");
        Ok(())
    }

    pub fn clear_extra_rewards(&self, caller: &Address) -> Result<(), RewardError> {
        let mut state = self.state.write();
        state.management.ensure(caller)?;
        let removed = state.extras.len();
        state.extras.clear();
        info!(gauge = %self.address, removed, "extra rewards cleared");
        Ok(())
    }

    /// Fund the stream paying `token`, under the same window rules as
    /// [`queue_new_rewards`](Self::queue_new_rewards).
    pub fn queue_extra_rewards(&self, caller: &Address, token: &Address, amount: Amount) -> Result<QueueOutcome, RewardError> {
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let mut state = self.state.write();
        let now = self.ctx.clock.now();
        let idx = state.extra(token).ok_or(RewardError::UnknownExtraReward(*token))?;
        let mut acc = state.extras[idx].accrual(now, state.total_supply)?;
        let outcome = state.extras[idx].plan_queue(&mut acc, &state.config, amount, now)?;

        let extra = &mut state.extras[idx];
        extra.token().transfer(caller, &self.address, amount)?;
        if let QueueOutcome::Started { reward_rate, period_finish } = outcome {
            extra.start_window(&mut acc, reward_rate, period_finish, now);
            info!(gauge = %self.address, %token, amount, reward_rate, period_finish, "extra reward window started");
        } else {
            debug!(gauge = %self.address, %token, amount, "extra top-up deferred");
        }
        extra.commit(acc, []);
        Ok(outcome)
    }

    /// Send the gauge's whole balance of an unrelated `token` to management.
    /// The vault token, the reward token and extra reward tokens are refused.
    pub fn sweep(&self, caller: &Address, token: &dyn FungibleToken) -> Result<Amount, RewardError> {
        let state = self.state.read();
        state.management.ensure(caller)?;
        let address = token.address();
        if address == self.vault.address()
            || address == self.ctx.reward_token.address()
            || state.extra(&address).is_some()
        {
            return Err(RewardError::ProtectedToken(address));
        }
        let amount = token.balance_of(&self.address);
        if amount > 0 {
            token.transfer(&self.address, caller, amount)?;
        }
        info!(gauge = %self.address, token = %address, amount, "token swept");
        Ok(amount)
    }

    // --- approvals ---

    /// Grant (or, with [`Capabilities::NONE`], revoke) `operator`'s rights over `owner`'s position.
    pub fn set_approvals(&self, owner: &Address, operator: &Address, caps: Capabilities) {
        let mut state = self.state.write();
        if caps.is_none() {
            state.approvals.remove(&(*owner, *operator));
        } else {
            state.approvals.insert((*owner, *operator), caps);
        }
        debug!(gauge = %self.address, %owner, %operator, ?caps, "approvals set");
    }

    pub fn approvals(&self, owner: &Address, operator: &Address) -> Capabilities {
        self.state.read().capabilities(owner, operator)
    }

    // --- admin ---

    /// Change the window length, re-spreading whatever is left of the
    /// current window over a fresh window of the new length.
    pub fn set_duration(&self, caller: &Address, duration: u64) -> Result<(), RewardError> {
        let mut state = self.state.write();
        let now = self.ctx.clock.now();
        state.management.ensure(caller)?;
        if duration == 0 {
            return Err(RewardError::InvalidParameter("duration must be positive"));
        }
        let mut acc = state.accrual(now)?;
        if now < state.period_finish {
            let remaining = (state.period_finish - now) as u128;
            let undistributed = mul_div(state.reward_rate, remaining, REWARD_PRECISION)?;
            state.reward_rate = mul_div(undistributed, REWARD_PRECISION, duration as u128)?;
            state.period_finish = now.saturating_add(duration);
            acc.last_update_time = now;
        }
        state.config.duration = duration;
        state.commit(acc, []);
        info!(gauge = %self.address, duration, reward_rate = state.reward_rate, "duration set");
        Ok(())
    }

    /// Replace the boost policy. Stored boosts keep their old value until re-measured.
    pub fn set_boost_policy(&self, caller: &Address, policy: BoostPolicy) -> Result<(), RewardError> {
        let mut state = self.state.write();
        state.management.ensure(caller)?;
        policy.validate()?;
        state.config.boost = policy;
        info!(gauge = %self.address, ?policy, "boost policy set");
        Ok(())
    }

    pub fn set_management(&self, caller: &Address, new: Address) -> Result<(), RewardError> {
        Ok(self.state.write().management.set_management(caller, new)?)
    }

    pub fn accept_management(&self, caller: &Address) -> Result<(), RewardError> {
        Ok(self.state.write().management.accept_management(caller)?)
    }

    // --- views ---

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn vault(&self) -> Address {
        self.vault.address()
    }

    pub fn config(&self) -> GaugeConfig {
        self.state.read().config
    }

    pub fn management(&self) -> Management {
        self.state.read().management
    }

    pub fn reward_per_token(&self) -> Result<u128, RewardError> {
        Ok(self.state.read().reward_per_token(self.ctx.clock.now())?)
    }

    /// Rewards `account` could claim right now.
    pub fn earned(&self, account: &Address) -> Result<Amount, RewardError> {
        let state = self.state.read();
        let mut acc = state.accrual(self.ctx.clock.now())?;
        let mut d = state.depositor(account);
        acc.settle(&mut d)?;
        Ok(d.rewards)
    }

    /// Extra rewards of `token` that `account` could claim right now.
    pub fn extra_earned(&self, account: &Address, token: &Address) -> Result<Amount, RewardError> {
        let state = self.state.read();
        let idx = state.extra(token).ok_or(RewardError::UnknownExtraReward(*token))?;
        let extra = &state.extras[idx];
        let mut acc = extra.accrual(self.ctx.clock.now(), state.total_supply)?;
        let mut p = extra.position(account);
        acc.settle(&mut p, &state.depositor(account))?;
        Ok(p.rewards)
    }

    pub fn extra_rewards_len(&self) -> usize {
        self.state.read().extras.len()
    }

    pub fn extra_rewards(&self) -> Vec<ExtraRewardInfo> {
        self.state.read().extras.iter().map(ExtraReward::info).collect()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.read().depositor(account).balance
    }

    /// Boosted balance as of the account's last measurement.
    pub fn boosted_balance_of(&self, account: &Address) -> Amount {
        self.state.read().depositor(account).boosted
    }

    /// Boosted balance the account would get if measured now.
    pub fn next_boosted_balance_of(&self, account: &Address) -> Result<Amount, RewardError> {
        let state = self.state.read();
        let balance = state.depositor(account).balance;
        self.measure(&state.config.boost, account, balance, state.total_supply)
    }

    pub fn depositor(&self, account: &Address) -> Depositor {
        self.state.read().depositor(account)
    }

    pub fn total_supply(&self) -> Amount {
        self.state.read().total_supply
    }

    /// Reward tokens per second, scaled by `REWARD_PRECISION`.
    pub fn reward_rate(&self) -> u128 {
        self.state.read().reward_rate
    }

    pub fn period_finish(&self) -> Timestamp {
        self.state.read().period_finish
    }

    pub fn last_update_time(&self) -> Timestamp {
        self.state.read().last_update_time
    }

    pub fn last_time_reward_applicable(&self) -> Timestamp {
        self.state.read().last_time_reward_applicable(self.ctx.clock.now())
    }

    pub fn queued_rewards(&self) -> Amount {
        self.state.read().queued_rewards
    }

    pub fn queued_penalty(&self) -> Amount {
        self.state.read().queued_penalty
    }
}
