//! Extra reward streams a gauge pays alongside its main reward token.
//!
//! A stream has its own token, window and `reward_per_token`. It accrues on
//! the gauge's raw supply and pays on the depositor's boosted balance, the
//! same one the main reward uses. The unboosted share of an extra stream has
//! no locker pool to go to, so it stays queued in the stream and is spread
//! again with its next window.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ve_core::constants::REWARD_PRECISION;
use ve_core::error::MathError;
use ve_core::math::{self, mul_div};
use ve_core::traits::FungibleToken;
use ve_core::types::{Address, Amount, Timestamp};

use crate::gauge::{plan_window, Depositor, GaugeConfig, QueueOutcome};

/// An account's standing in one extra stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ExtraPosition {
    pub(crate) reward_per_token_paid: u128,
    pub(crate) rewards: Amount,
}

/// Stream scalars advanced to "now", applied by [`ExtraReward::commit`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct ExtraAccrual {
    reward_per_token_stored: u128,
    last_update_time: Timestamp,
    queued_rewards: Amount,
}

impl ExtraAccrual {
    /// Credit `p` with what `d`'s boosted balance earned since it was last settled.
    pub(crate) fn settle(&mut self, p: &mut ExtraPosition, d: &Depositor) -> Result<(), MathError> {
        let delta = math::sub(self.reward_per_token_stored, p.reward_per_token_paid)?;
        let earned = mul_div(d.boosted, delta, REWARD_PRECISION)?;
        let full = mul_div(d.balance, delta, REWARD_PRECISION)?;
        p.rewards = math::add(p.rewards, earned)?;
        p.reward_per_token_paid = self.reward_per_token_stored;
        self.queued_rewards = math::add(self.queued_rewards, full.saturating_sub(earned))?;
        Ok(())
    }
}

/// Public snapshot of one stream.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtraRewardInfo {
    pub token: Address,
    pub reward_rate: u128,
    pub period_finish: Timestamp,
    pub reward_per_token_stored: u128,
    pub queued_rewards: Amount,
}

pub(crate) struct ExtraReward {
    token: Arc<dyn FungibleToken>,
    reward_rate: u128,
    period_finish: Timestamp,
    last_update_time: Timestamp,
    reward_per_token_stored: u128,
    queued_rewards: Amount,
    positions: HashMap<Address, ExtraPosition>,
}

impl ExtraReward {
    pub(crate) fn new(token: Arc<dyn FungibleToken>) -> Self {
        Self {
            token,
            reward_rate: 0,
            period_finish: 0,
            last_update_time: 0,
            reward_per_token_stored: 0,
            queued_rewards: 0,
            positions: HashMap::new(),
        }
    }

    pub(crate) fn token(&self) -> &Arc<dyn FungibleToken> {
        &self.token
    }

    pub(crate) fn address(&self) -> Address {
        self.token.address()
    }

    pub(crate) fn info(&self) -> ExtraRewardInfo {
        ExtraRewardInfo {
            token: self.address(),
            reward_rate: self.reward_rate,
            period_finish: self.period_finish,
            reward_per_token_stored: self.reward_per_token_stored,
            queued_rewards: self.queued_rewards,
        }
    }

    pub(crate) fn position(&self, account: &Address) -> ExtraPosition {
        self.positions.get(account).copied().unwrap_or_default()
    }

    fn last_time_reward_applicable(&self, now: Timestamp) -> Timestamp {
        now.min(self.period_finish)
    }

    fn reward_per_token(&self, now: Timestamp, total_supply: Amount) -> Result<u128, MathError> {
        if total_supply == 0 {
            return Ok(self.reward_per_token_stored);
        }
        let dt = self.last_time_reward_applicable(now).saturating_sub(self.last_update_time);
        let accrued = mul_div(dt as u128, self.reward_rate, total_supply)?;
        math::add(self.reward_per_token_stored, accrued)
    }

    /// Advance to `now` over a gauge holding `total_supply` raw deposits.
    pub(crate) fn accrual(&self, now: Timestamp, total_supply: Amount) -> Result<ExtraAccrual, MathError> {
        Ok(ExtraAccrual {
            reward_per_token_stored: self.reward_per_token(now, total_supply)?,
            last_update_time: self.last_time_reward_applicable(now).max(self.last_update_time),
            queued_rewards: self.queued_rewards,
        })
    }

    /// Plan funding the stream with `amount`, under the gauge's window rules.
    pub(crate) fn plan_queue(
        &self,
        acc: &mut ExtraAccrual,
        config: &GaugeConfig,
        amount: Amount,
        now: Timestamp,
    ) -> Result<QueueOutcome, MathError> {
        plan_window(config, self.reward_rate, self.period_finish, &mut acc.queued_rewards, amount, now)
    }

    pub(crate) fn start_window(&mut self, acc: &mut ExtraAccrual, reward_rate: u128, period_finish: Timestamp, now: Timestamp) {
        acc.last_update_time = now;
        self.reward_rate = reward_rate;
        self.period_finish = period_finish;
    }

    pub(crate) fn commit(&mut self, acc: ExtraAccrual, updates: impl IntoIterator<Item = (Address, ExtraPosition)>) {
        self.reward_per_token_stored = acc.reward_per_token_stored;
        self.last_update_time = acc.last_update_time;
        self.queued_rewards = acc.queued_rewards;
        for (account, p) in updates {
            if p == ExtraPosition::default() {
                self.positions.remove(&account);
            } else {
                self.positions.insert(account, p);
            }
        }
    }
}
