//! Wires the protocol over a manual clock and replays scenario steps.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use serde::Serialize;
use tracing::{debug, info};

use ve_core::constants::{COIN, DAY, WEEK};
use ve_core::traits::{Clock, FungibleToken, VotingPowerOracle};
use ve_core::types::{Address, Amount, Timestamp};
use ve_core::{ManualClock, MemoryToken};
use ve_gauge::{ExtraRewardInfo, Gauge, GaugeContext, Registry, RewardPool, StandardGaugeFactory};
use ve_ledger::LockLedger;
use ve_voter::{VoteDelegation, Voter};

use crate::scenario::{Scenario, SimConfig, Step};

const TOKEN_SYMBOL: &str = "VE";

fn admin() -> Address {
    Address::from_name("admin")
}

fn tokens(whole: u128) -> Result<Amount> {
    whole.checked_mul(COIN).context("amount overflows base units")
}

fn rfc3339(ts: Timestamp) -> Option<String> {
    let secs = i64::try_from(ts).ok()?;
    DateTime::from_timestamp(secs, 0).map(|t| t.to_rfc3339())
}

struct VaultEntry {
    token: Arc<MemoryToken>,
    gauge: Arc<Gauge>,
    extras: BTreeMap<String, Arc<MemoryToken>>,
}

pub struct Simulation {
    clock: Arc<ManualClock>,
    token: Arc<MemoryToken>,
    ledger: Arc<LockLedger>,
    pool: Arc<RewardPool>,
    registry: Arc<Registry>,
    voter: Arc<Voter>,
    accounts: BTreeMap<String, Address>,
    vaults: BTreeMap<String, VaultEntry>,
    steps_applied: usize,
}

impl Simulation {
    pub fn new(config: &SimConfig, start: Timestamp) -> Result<Self> {
        config.validate()?;
        let clock = Arc::new(ManualClock::new(start));
        let token = Arc::new(MemoryToken::new(TOKEN_SYMBOL));
        let ledger = Arc::new(LockLedger::new(
            config.ledger.clone(),
            token.clone(),
            clock.clone(),
            Address::from_name("ledger"),
            admin(),
        )?);
        let pool = Arc::new(RewardPool::new(
            Address::from_name("reward-pool"),
            token.clone(),
            ledger.clone(),
            clock.clone(),
        ));
        ledger.set_penalty_recipient(&admin(), pool.clone())?;

        let ctx = GaugeContext {
            clock: clock.clone(),
            oracle: ledger.clone(),
            escrow: ledger.clone(),
            reward_token: token.clone(),
            penalty_sink: pool.clone(),
        };
        let factory = StandardGaugeFactory::new(config.gauge, ctx)?;
        let registry = Arc::new(Registry::new(Arc::new(factory), admin())?);
        let delegation = Arc::new(VoteDelegation::new(clock.clone()));
        let voter = Arc::new(Voter::new(ledger.clone(), registry.clone(), delegation));

        info!(start, "simulation initialized");
        Ok(Self {
            clock,
            token,
            ledger,
            pool,
            registry,
            voter,
            accounts: BTreeMap::new(),
            vaults: BTreeMap::new(),
            steps_applied: 0,
        })
    }

    /// Replay every step of `scenario` and report the final state.
    pub fn run(scenario: &Scenario) -> Result<Report> {
        let mut sim = Self::new(&scenario.config, scenario.start)?;
        for (i, step) in scenario.steps.iter().enumerate() {
            sim.apply(step).with_context(|| format!("step {i} ({})", step.name()))?;
        }
        sim.report()
    }

    fn account(&mut self, name: &str) -> Address {
        *self.accounts.entry(name.to_owned()).or_insert_with(|| Address::from_name(name))
    }

    fn vault(&self, name: &str) -> Result<&VaultEntry> {
        self.vaults.get(name).with_context(|| format!("unknown vault {name:?}"))
    }

    fn extra_token(&self, vault: &str, token: &str) -> Result<&Arc<MemoryToken>> {
        self.vault(vault)?
            .extras
            .get(token)
            .with_context(|| format!("unknown extra reward {token:?} on vault {vault:?}"))
    }

    pub fn apply(&mut self, step: &Step) -> Result<()> {
        let now = self.clock.now();
        match step {
            Step::Advance { weeks, days, secs } => {
                let dt = weeks * WEEK + days * DAY + secs;
                if dt == 0 {
                    bail!("advance by zero");
                }
                self.clock.advance(dt);
            }
            Step::Mint { account, amount } => {
                let who = self.account(account);
                self.token.mint(&who, tokens(*amount)?)?;
            }
            Step::Lock { account, amount, weeks } => {
                let who = self.account(account);
                self.ledger.create_lock(&who, tokens(*amount)?, now + weeks * WEEK)?;
            }
            Step::IncreaseAmount { account, amount } => {
                let who = self.account(account);
                self.ledger.increase_amount(&who, tokens(*amount)?)?;
            }
            Step::Extend { account, weeks } => {
                let who = self.account(account);
                self.ledger.increase_unlock_time(&who, now + weeks * WEEK)?;
            }
            Step::Withdraw { account } => {
                let who = self.account(account);
                self.ledger.withdraw(&who)?;
            }
            Step::ForceWithdraw { account } => {
                let who = self.account(account);
                let out = self.ledger.force_withdraw(&who)?;
                info!(%who, amount = out.amount, penalty = out.penalty, "early exit");
            }
            Step::Checkpoint => {
                let outcome = self.ledger.checkpoint()?;
                debug!(weeks = outcome.weeks_advanced, caught_up = outcome.caught_up, "checkpoint");
            }
            Step::AddVault { vault } => {
                if self.vaults.contains_key(vault) {
                    bail!("vault {vault:?} already exists");
                }
                let token = Arc::new(MemoryToken::new(vault));
                let gauge = self.registry.add_vault_to_rewards(&admin(), token.clone())?;
                self.vaults.insert(vault.clone(), VaultEntry { token, gauge, extras: BTreeMap::new() });
            }
            Step::RemoveVault { vault } => {
                let address = self.vault(vault)?.token.address();
                self.registry.remove_vault_from_rewards(&admin(), &address)?;
            }
            Step::Deposit { vault, account, amount } => {
                let who = self.account(account);
                let amount = tokens(*amount)?;
                let entry = self.vault(vault)?;
                entry.token.mint(&who, amount)?;
                entry.gauge.deposit(&who, amount, None)?;
            }
            Step::WithdrawGauge { vault, account, amount, claim } => {
                let who = self.account(account);
                let gauge = &self.vault(vault)?.gauge;
                match amount {
                    Some(amount) => gauge.withdraw(&who, tokens(*amount)?, *claim, false)?,
                    None => gauge.withdraw_all(&who, *claim, false)?,
                };
            }
            Step::QueueRewards { vault, funder, amount } => {
                let funder = self.account(funder);
                let outcome = self.vault(vault)?.gauge.queue_new_rewards(&funder, tokens(*amount)?)?;
                debug!(vault = %vault, ?outcome, "rewards queued");
            }
            Step::Claim { vault, account, lock } => {
                let who = self.account(account);
                self.vault(vault)?.gauge.get_reward(&who, *lock)?;
            }
            Step::ClaimPool { account } => {
                let who = self.account(account);
                self.pool.claim(&who)?;
            }
            Step::AddExtraReward { vault, token } => {
                let entry = self.vaults.get_mut(vault).with_context(|| format!("unknown vault {vault:?}"))?;
                let extra = Arc::new(MemoryToken::new(token));
                entry.gauge.add_extra_reward(&admin(), extra.clone())?;
                entry.extras.insert(token.clone(), extra);
            }
            Step::QueueExtraRewards { vault, token, funder, amount } => {
                let funder = self.account(funder);
                let amount = tokens(*amount)?;
                let extra = self.extra_token(vault, token)?;
                extra.mint(&funder, amount)?;
                let outcome = self.vault(vault)?.gauge.queue_extra_rewards(&funder, &extra.address(), amount)?;
                debug!(vault = %vault, token = %token, ?outcome, "extra rewards queued");
            }
            Step::SweepPenalty { vault } => {
                self.vault(vault)?.gauge.transfer_queued_penalty()?;
            }
            Step::Kick { vault, accounts } => {
                let accounts: Vec<Address> = accounts.iter().map(|a| self.account(a)).collect();
                let kicked = self.vault(vault)?.gauge.kick(&accounts)?;
                debug!(vault = %vault, kicked, "kick");
            }
            Step::Vote { account, vaults, weights, on_behalf_of } => {
                let caller = self.account(account);
                let mut accounts = vec![caller];
                for name in on_behalf_of {
                    accounts.push(self.account(name));
                }
                let targets = vaults
                    .iter()
                    .map(|v| self.vault(v).map(|e| e.token.address()))
                    .collect::<Result<Vec<_>>>()?;
                self.voter.vote_for(&caller, &accounts, &targets, weights)?;
            }
            Step::Delegate { account, to, locked_weeks } => {
                let who = self.account(account);
                let to = self.account(to);
                let until = if *locked_weeks == 0 { 0 } else { now + locked_weeks * WEEK };
                self.voter.delegation().delegate(&who, to, until)?;
            }
            Step::Poke { account } => {
                let who = self.account(account);
                self.voter.poke(&who)?;
            }
        }
        self.steps_applied += 1;
        Ok(())
    }

    pub fn report(&self) -> Result<Report> {
        let now = self.clock.now();
        let mut accounts = Vec::with_capacity(self.accounts.len());
        for (name, address) in &self.accounts {
            let lock = self.ledger.locked(address);
            accounts.push(AccountReport {
                name: name.clone(),
                address: *address,
                token_balance: self.token.balance_of(address),
                locked_amount: lock.amount,
                lock_end: lock.end,
                lock_end_time: if lock.end == 0 { None } else { rfc3339(lock.end) },
                voting_power: self.ledger.balance_of(address)?,
                vote_weight_used: self.voter.used_weights(address),
                pool_cursor: self.pool.cursor_of(address),
            });
        }

        let mut gauges = Vec::with_capacity(self.vaults.len());
        for (name, entry) in &self.vaults {
            let gauge = &entry.gauge;
            let mut depositors = BTreeMap::new();
            for (account, address) in &self.accounts {
                let balance = gauge.balance_of(address);
                if balance == 0 && gauge.earned(address)? == 0 {
                    continue;
                }
                depositors.insert(
                    account.clone(),
                    DepositorReport {
                        balance,
                        boosted_balance: gauge.boosted_balance_of(address),
                        earned: gauge.earned(address)?,
                    },
                );
            }
            let vault = entry.token.address();
            gauges.push(GaugeReport {
                vault: name.clone(),
                gauge: gauge.address(),
                registered: self.registry.is_registered(&vault),
                total_supply: gauge.total_supply(),
                reward_rate: gauge.reward_rate(),
                period_finish: gauge.period_finish(),
                period_finish_time: rfc3339(gauge.period_finish()),
                queued_rewards: gauge.queued_rewards(),
                queued_penalty: gauge.queued_penalty(),
                vote_weight: self.voter.weights(&vault),
                extra_rewards: gauge.extra_rewards(),
                depositors,
            });
        }

        Ok(Report {
            timestamp: now,
            time: rfc3339(now),
            block: self.clock.block_number(),
            steps: self.steps_applied,
            ledger: LedgerReport {
                locked_supply: self.ledger.supply(),
                // Absent while the global curve is too stale to read without a checkpoint.
                total_voting_power: self.ledger.total_supply().ok(),
                epoch: self.ledger.epoch(),
            },
            pool: PoolReport {
                total_received: self.pool.total_received(),
                total_claimed: self.pool.total_claimed(),
                funded_weeks: self.pool.funded_weeks().len(),
            },
            total_vote_weight: self.voter.total_weight(),
            accounts,
            gauges,
        })
    }
}

#[derive(Serialize, Debug)]
pub struct Report {
    pub timestamp: Timestamp,
    pub time: Option<String>,
    pub block: u64,
    pub steps: usize,
    pub ledger: LedgerReport,
    pub pool: PoolReport,
    pub total_vote_weight: Amount,
    pub accounts: Vec<AccountReport>,
    pub gauges: Vec<GaugeReport>,
}

#[derive(Serialize, Debug)]
pub struct LedgerReport {
    pub locked_supply: Amount,
    pub total_voting_power: Option<Amount>,
    pub epoch: usize,
}

#[derive(Serialize, Debug)]
pub struct PoolReport {
    pub total_received: Amount,
    pub total_claimed: Amount,
    pub funded_weeks: usize,
}

#[derive(Serialize, Debug)]
pub struct AccountReport {
    pub name: String,
    pub address: Address,
    pub token_balance: Amount,
    pub locked_amount: Amount,
    pub lock_end: Timestamp,
    pub lock_end_time: Option<String>,
    pub voting_power: Amount,
    pub vote_weight_used: Amount,
    pub pool_cursor: Timestamp,
}

#[derive(Serialize, Debug)]
pub struct GaugeReport {
    pub vault: String,
    pub gauge: Address,
    pub registered: bool,
    pub total_supply: Amount,
    pub reward_rate: u128,
    pub period_finish: Timestamp,
    pub period_finish_time: Option<String>,
    pub queued_rewards: Amount,
    pub queued_penalty: Amount,
    pub vote_weight: Amount,
    pub extra_rewards: Vec<ExtraRewardInfo>,
    pub depositors: BTreeMap<String, DepositorReport>,
}

#[derive(Serialize, Debug)]
pub struct DepositorReport {
    pub balance: Amount,
    pub boosted_balance: Amount,
    pub earned: Amount,
}
