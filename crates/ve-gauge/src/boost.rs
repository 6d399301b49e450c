//! Boost policies: how voting power turns a raw deposit into a reward-earning balance.
//!
//! Both policies return a boosted balance `<= raw`. Under either one the
//! gauge queues the difference as penalty, swept to the lockers' reward pool.

use serde::{Deserialize, Serialize};

use ve_core::constants::{BPS, DEFAULT_BOOST_FLOOR_BPS, MIN_BOOST_FLOOR_BPS};
use ve_core::error::{MathError, RewardError};
use ve_core::math::mul_div;
use ve_core::types::Amount;

/// Shape of the locking ratio under [`BoostPolicy::PenaltyRedirect`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyCurve {
    Linear,
    Quadratic,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BoostPolicy {
    /// `min(B, B*floor + B*f*(1 - floor))` where `f` is the holder's share
    /// of total voting power.
    Floor { floor_bps: u128 },
    /// `B * ratio` (or `ratio²`) where `ratio = min(1, f / (B / gauge_total))`:
    /// full credit once the holder's share of voting power matches their
    /// share of the gauge.
    PenaltyRedirect { curve: PenaltyCurve },
}

impl Default for BoostPolicy {
    fn default() -> Self {
        Self::Floor { floor_bps: DEFAULT_BOOST_FLOOR_BPS }
    }
}

impl BoostPolicy {
    pub fn validate(&self) -> Result<(), RewardError> {
        if let Self::Floor { floor_bps } = self {
            if *floor_bps < MIN_BOOST_FLOOR_BPS {
                return Err(RewardError::InvalidParameter("boost floor too low"));
            }
            if *floor_bps >= BPS {
                return Err(RewardError::InvalidParameter("boost floor too high"));
            }
        }
        Ok(())
    }

    /// Boosted balance for a raw deposit of `balance` in a gauge holding
    /// `gauge_total`, for a holder with `ve_balance` out of `ve_total`.
    pub fn boosted_balance(
        &self,
        balance: Amount,
        gauge_total: Amount,
        ve_balance: Amount,
        ve_total: Amount,
    ) -> Result<Amount, MathError> {
        if balance == 0 {
            return Ok(0);
        }
        let boosted = match *self {
            Self::Floor { floor_bps } => {
                let floor = mul_div(balance, floor_bps, BPS)?;
                if ve_total == 0 {
                    floor
                } else {
                    let share = mul_div(balance, ve_balance, ve_total)?;
                    let bonus = mul_div(share, BPS.saturating_sub(floor_bps), BPS)?;
                    floor.saturating_add(bonus)
                }
            }
            Self::PenaltyRedirect { curve } => {
                if ve_total == 0 {
                    return Ok(0);
                }
                // B * f / (B / gauge_total) == ve_balance * gauge_total / ve_total
                let linear = mul_div(ve_balance, gauge_total, ve_total)?.min(balance);
                match curve {
                    PenaltyCurve::Linear => linear,
                    PenaltyCurve::Quadratic => mul_div(linear, linear, balance)?,
                }
            }
        };
        Ok(boosted.min(balance))
    }
}
