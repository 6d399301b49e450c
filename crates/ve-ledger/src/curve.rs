//! Piecewise-linear voting-power curves.
//!
//! A curve is a [`Point`] plus a schedule of slope changes keyed by week
//! boundary. Between boundaries the curve is linear; at each boundary the
//! scheduled delta (always `<= 0`, a lock expiring) is added to the slope.
//! Both helpers here are pure and bounded by an explicit week cap.

use std::collections::BTreeMap;

use ve_core::constants::{floor_week, WEEK};
use ve_core::error::{LedgerError, MathError};
use ve_core::math;
use ve_core::types::{Amount, BlockNumber, LockedBalance, Point, Timestamp};

/// Scaled `(bias, slope)` contributed by `lock` at `now`.
///
/// `slope = amount`, `bias = amount * (end - now)`; zero once the lock has
/// ended or when it is empty.
pub fn lock_point(lock: &LockedBalance, now: Timestamp) -> Result<(i128, i128), MathError> {
    if !lock.is_active(now) {
        return Ok((0, 0));
    }
    let slope = math::to_signed(lock.amount)?;
    let bias = math::mul_i(slope, (lock.end - now) as i128)?;
    Ok((bias, slope))
}

/// Scheduled slope change at `ts` (0 if none).
pub fn change_at(changes: &BTreeMap<Timestamp, i128>, ts: Timestamp) -> i128 {
    changes.get(&ts).copied().unwrap_or(0)
}

/// Result of walking the global curve forward to "now".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Walk {
    /// Week-boundary points crossed on the way, oldest first.
    pub history: Vec<Point>,
    /// The point at `now` when caught up, otherwise the last boundary reached.
    pub last: Point,
    /// Whether the walk reached `now` within the cap.
    pub caught_up: bool,
    /// Iterations used.
    pub weeks: u32,
}

/// Walk `from` forward week by week to `now`, applying each scheduled slope
/// change at the boundary it falls on.
///
/// Block numbers of the intermediate boundary points are interpolated
/// linearly between `from.blk` and `blk`. Gives up after `max_weeks`
/// iterations, returning whatever progress was made with `caught_up == false`.
pub fn walk(
    from: Point,
    now: Timestamp,
    blk: BlockNumber,
    changes: &BTreeMap<Timestamp, i128>,
    max_weeks: u32,
) -> Result<Walk, MathError> {
    let now = now.max(from.ts);
    let dt_total = (now - from.ts) as u128;
    let dblk_total = blk.saturating_sub(from.blk) as u128;

    let mut point = from;
    let mut history = Vec::new();
    let mut t_i = floor_week(from.ts);
    let mut weeks = 0u32;
    let mut caught_up = false;

    while weeks < max_weeks {
        t_i = t_i.saturating_add(WEEK);
        let mut d_slope = 0;
        if t_i > now {
            t_i = now;
        } else {
            d_slope = change_at(changes, t_i);
        }

        let dt = (t_i - point.ts) as i128;
        point.bias = point.bias.checked_sub(math::mul_i(point.slope, dt)?).ok_or(MathError::Overflow)?;
        point.slope = point.slope.checked_add(d_slope).ok_or(MathError::Overflow)?;
        point.bias = point.bias.max(0);
        point.slope = point.slope.max(0);
        point.ts = t_i;
        weeks += 1;

        if t_i == now {
            point.blk = blk.max(from.blk);
            caught_up = true;
            break;
        }
        let dblk = if dt_total == 0 { 0 } else { math::mul_div(dblk_total, (t_i - from.ts) as u128, dt_total)? };
        point.blk = from.blk + dblk as BlockNumber;
        history.push(point);
    }

    Ok(Walk { history, last: point, caught_up, weeks })
}

/// Bias of the curve starting at `from` when evaluated at `t >= from.ts`.
///
/// Walks the schedule week by week and stops early once the slope reaches
/// zero, after which the curve is flat. A walk that would need more than
/// `max_weeks` iterations fails with [`LedgerError::StaleCheckpoint`].
pub fn project(
    from: &Point,
    t: Timestamp,
    changes: &BTreeMap<Timestamp, i128>,
    max_weeks: u32,
) -> Result<i128, LedgerError> {
    if t <= from.ts {
        return Ok(from.bias.max(0));
    }
    let mut bias = from.bias;
    let mut slope = from.slope;
    let mut last = from.ts;
    let mut t_i = floor_week(from.ts);

    for _ in 0..max_weeks {
        if slope <= 0 {
            return Ok(bias.max(0));
        }
        t_i = t_i.saturating_add(WEEK);
        let mut d_slope = 0;
        if t_i > t {
            t_i = t;
        } else {
            d_slope = change_at(changes, t_i);
        }
        let decayed = math::mul_i(slope, (t_i - last) as i128)?;
        bias = bias.checked_sub(decayed).ok_or(MathError::Overflow)?;
        if t_i == t {
            return Ok(bias.max(0));
        }
        slope = slope.checked_add(d_slope).ok_or(MathError::Overflow)?;
        last = t_i;
    }

    if slope <= 0 {
        return Ok(bias.max(0));
    }
    Err(LedgerError::StaleCheckpoint { weeks_behind: (t - from.ts) / WEEK })
}

/// Convert a scaled bias into reported voting power.
pub fn power(bias: i128, max_lock_time: u64) -> Amount {
    if bias <= 0 {
        return 0;
    }
    bias as u128 / max_lock_time as u128
}
