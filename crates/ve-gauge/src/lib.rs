//! # ve-gauge — Reward distribution for vote-escrow lockers.
//!
//! - [`gauge`]: per-vault staking gauges. Rewards stream linearly over a
//!   window and are shared by *boosted* balances, so depositors with more
//!   voting power earn a larger cut of the same deposit.
//! - [`boost`]: the boost formulas, a floor share or a penalty curve. Either
//!   way the forfeited share is swept to the reward pool.
//! - [`extra`]: additional reward tokens a gauge streams next to its main one.
//! - [`registry`]: which vaults have gauges; registered vaults are the
//!   eligible vote targets.
//! - [`reward_pool`]: weekly buckets paid to lockers pro rata to voting
//!   power at each week start.

pub mod boost;
pub mod extra;
pub mod gauge;
pub mod registry;
pub mod reward_pool;

pub use boost::{BoostPolicy, PenaltyCurve};
pub use extra::ExtraRewardInfo;
pub use gauge::{Depositor, Gauge, GaugeConfig, GaugeContext, QueueOutcome};
pub use registry::{GaugeFactory, Registry, StandardGaugeFactory};
pub use reward_pool::RewardPool;
