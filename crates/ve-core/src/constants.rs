//! Protocol constants. All token amounts are base units (1 token = 10^18 units).

use crate::types::Timestamp;

/// One whole token in base units.
pub const COIN: u128 = 1_000_000_000_000_000_000;

/// Seconds in one day.
pub const DAY: u64 = 86_400;

/// Seconds in one week. Lock ends and slope changes are aligned to this grid.
pub const WEEK: u64 = 7 * DAY;

/// Maximum lock duration: four years, rounded down to a whole number of weeks.
///
/// Keeping it week-aligned means a lock taken on a week boundary for the full
/// duration ends exactly on a week boundary and reads back its full amount.
pub const MAXTIME: u64 = 208 * WEEK;

/// Basis-point denominator.
pub const BPS: u128 = 10_000;

/// Fixed-point scale for reward rates and accrued reward per token.
pub const REWARD_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Default cap on weekly iterations of a checkpoint walk or projection.
///
/// A global curve that has not been checkpointed for longer than this must be
/// advanced incrementally with repeated `checkpoint()` calls.
pub const DEFAULT_MAX_WALK_WEEKS: u32 = 500;

/// Default upper bound on the early-exit penalty (75%).
pub const DEFAULT_EARLY_EXIT_MAX_PENALTY_BPS: u128 = 7_500;

/// Default length of a gauge reward window.
pub const DEFAULT_REWARD_DURATION: u64 = 7 * DAY;

/// Default deferral threshold for top-ups during an active window (120%).
pub const DEFAULT_QUEUE_THRESHOLD_BPS: u128 = 12_000;

/// Default unboosted floor of a depositor's balance (10%).
pub const DEFAULT_BOOST_FLOOR_BPS: u128 = 1_000;

/// Lowest floor accepted by `set_boost_policy`.
pub const MIN_BOOST_FLOOR_BPS: u128 = 100;

/// Weeks a single reward-pool claim walks before returning.
pub const MAX_CLAIM_WEEKS: u32 = 50;

/// Round a timestamp down to the start of its week.
///
/// # Examples
///
/// ```
/// use ve_core::constants::{floor_week, WEEK};
/// assert_eq!(floor_week(0), 0);
/// assert_eq!(floor_week(WEEK - 1), 0);
/// assert_eq!(floor_week(WEEK), WEEK);
/// assert_eq!(floor_week(3 * WEEK + 17), 3 * WEEK);
/// ```
pub fn floor_week(ts: Timestamp) -> Timestamp {
    ts / WEEK * WEEK
}
