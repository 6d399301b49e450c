//! Scenario files: protocol configuration plus an ordered list of steps.
//!
//! Accounts and vaults are referred to by name. Account addresses are derived
//! from the name, so the same name always maps to the same address. Token
//! amounts are whole tokens (scaled by `COIN` when applied).

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ve_core::constants::WEEK;
use ve_core::types::Timestamp;
use ve_gauge::GaugeConfig;
use ve_ledger::LedgerConfig;

/// Week-aligned default start time (2023-08-31T00:00:00Z).
pub const DEFAULT_START: Timestamp = 2_800 * WEEK;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub ledger: LedgerConfig,
    pub gauge: GaugeConfig,
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        self.ledger.validate().context("invalid ledger config")?;
        self.gauge.validate().context("invalid gauge config")?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub config: SimConfig,
    #[serde(default = "default_start")]
    pub start: Timestamp,
    pub steps: Vec<Step>,
}

fn default_start() -> Timestamp {
    DEFAULT_START
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Advance {
        #[serde(default)]
        weeks: u64,
        #[serde(default)]
        days: u64,
        #[serde(default)]
        secs: u64,
    },
    Mint { account: String, amount: u128 },
    Lock { account: String, amount: u128, weeks: u64 },
    IncreaseAmount { account: String, amount: u128 },
    /// Move the unlock time to `now + weeks`.
    Extend { account: String, weeks: u64 },
    Withdraw { account: String },
    ForceWithdraw { account: String },
    Checkpoint,
    AddVault { vault: String },
    RemoveVault { vault: String },
    /// Mints the vault tokens to `account` first.
    Deposit { vault: String, account: String, amount: u128 },
    WithdrawGauge {
        vault: String,
        account: String,
        /// Whole deposit when absent.
        #[serde(default)]
        amount: Option<u128>,
        #[serde(default)]
        claim: bool,
    },
    QueueRewards { vault: String, funder: String, amount: u128 },
    Claim {
        vault: String,
        account: String,
        #[serde(default)]
        lock: bool,
    },
    ClaimPool { account: String },
    AddExtraReward { vault: String, token: String },
    /// Mints the extra tokens to `funder` first.
    QueueExtraRewards { vault: String, token: String, funder: String, amount: u128 },
    SweepPenalty { vault: String },
    Kick { vault: String, accounts: Vec<String> },
    Vote {
        account: String,
        vaults: Vec<String>,
        weights: Vec<u128>,
        /// Delegators to vote for as well; the voter must be their delegate.
        #[serde(default)]
        on_behalf_of: Vec<String>,
    },
    Delegate {
        account: String,
        to: String,
        /// Lock the delegation for this many weeks; 0 leaves it changeable.
        #[serde(default)]
        locked_weeks: u64,
    },
    Poke { account: String },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Advance { .. } => "advance",
            Step::Mint { .. } => "mint",
            Step::Lock { .. } => "lock",
            Step::IncreaseAmount { .. } => "increase_amount",
            Step::Extend { .. } => "extend",
            Step::Withdraw { .. } => "withdraw",
            Step::ForceWithdraw { .. } => "force_withdraw",
            Step::Checkpoint => "checkpoint",
            Step::AddVault { .. } => "add_vault",
            Step::RemoveVault { .. } => "remove_vault",
            Step::Deposit { .. } => "deposit",
            Step::WithdrawGauge { .. } => "withdraw_gauge",
            Step::QueueRewards { .. } => "queue_rewards",
            Step::Claim { .. } => "claim",
            Step::ClaimPool { .. } => "claim_pool",
            Step::AddExtraReward { .. } => "add_extra_reward",
            Step::QueueExtraRewards { .. } => "queue_extra_rewards",
            Step::SweepPenalty { .. } => "sweep_penalty",
            Step::Kick { .. } => "kick",
            Step::Vote { .. } => "vote",
            Step::Delegate { .. } => "delegate",
            Step::Poke { .. } => "poke",
        }
    }
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let scenario: Scenario =
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))?;
    scenario.config.validate()?;
    Ok(scenario)
}

pub fn load_config(path: &Path) -> Result<SimConfig> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: SimConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
