//! Voting-power queries over the ledger's checkpoints.
//!
//! Time-indexed reads are exact: binary search for the latest checkpoint at
//! or before the query time, then project along the slope-change schedule.
//! Block-indexed reads first estimate a timestamp for the block by linear
//! interpolation between the surrounding global checkpoints, so they can be
//! off by the decay accrued over the interpolation error.

use std::collections::BTreeMap;

use ve_core::error::LedgerError;
use ve_core::traits::{LockEscrow, VotingPowerOracle};
use ve_core::types::{Address, Amount, BlockNumber, LockedBalance, Point, Timestamp};

use crate::curve;
use crate::ledger::{LedgerState, LockLedger};

/// Index of the last point whose key is `<= target`.
fn latest_at_or_before<K: Ord>(points: &[Point], key: impl Fn(&Point) -> K, target: K) -> Option<usize> {
    points.partition_point(|p| key(p) <= target).checked_sub(1)
}

impl LockLedger {
    /// Current voting power of `account`.
    pub fn balance_of(&self, account: &Address) -> Result<Amount, LedgerError> {
        self.balance_of_at_time(account, self.clock.now())
    }

    /// Voting power of `account` at `ts`.
    pub fn balance_of_at_time(&self, account: &Address, ts: Timestamp) -> Result<Amount, LedgerError> {
        let state = self.state.read();
        self.user_power(&state, account, |p| p.ts, ts, ts)
    }

    /// Current total voting power.
    pub fn total_supply(&self) -> Result<Amount, LedgerError> {
        self.total_supply_at_time(self.clock.now())
    }

    /// Total voting power at `ts`.
    pub fn total_supply_at_time(&self, ts: Timestamp) -> Result<Amount, LedgerError> {
        let state = self.state.read();
        if state.is_migrated() {
            return Ok(0);
        }
        let Some(idx) = latest_at_or_before(&state.point_history, |p| p.ts, ts) else {
            return Ok(0);
        };
        let bias = curve::project(&state.point_history[idx], ts, &state.slope_changes, self.config.max_walk_weeks)?;
        Ok(curve::power(bias, self.config.max_lock_time))
    }

    /// Voting power of `account` as of block `block`.
    pub fn balance_of_at(&self, account: &Address, block: BlockNumber) -> Result<Amount, LedgerError> {
        let state = self.state.read();
        let Some((_, ts)) = self.block_time(&state, block)? else {
            return Ok(0);
        };
        self.user_power(&state, account, |p| p.blk, block, ts)
    }

    /// Total voting power as of block `block`.
    pub fn total_supply_at(&self, block: BlockNumber) -> Result<Amount, LedgerError> {
        let state = self.state.read();
        if state.is_migrated() {
            return Ok(0);
        }
        let Some((idx, ts)) = self.block_time(&state, block)? else {
            return Ok(0);
        };
        let bias = curve::project(&state.point_history[idx], ts, &state.slope_changes, self.config.max_walk_weeks)?;
        Ok(curve::power(bias, self.config.max_lock_time))
    }

    /// Locate the user point by `key <= target` and project it to `ts`.
    fn user_power<K: Ord>(
        &self,
        state: &LedgerState,
        account: &Address,
        key: impl Fn(&Point) -> K,
        target: K,
        ts: Timestamp,
    ) -> Result<Amount, LedgerError> {
        if state.is_migrated() {
            return Ok(0);
        }
        let Some(history) = state.user_point_history.get(account) else {
            return Ok(0);
        };
        let Some(idx) = latest_at_or_before(history, key, target) else {
            return Ok(0);
        };
        let empty = BTreeMap::new();
        let schedule = state.user_slope_changes.get(account).unwrap_or(&empty);
        let bias = curve::project(&history[idx], ts, schedule, self.config.max_walk_weeks)?;
        Ok(curve::power(bias, self.config.max_lock_time))
    }

    /// Global point index at or before `block` and the estimated timestamp
    /// of that block. `None` when the block predates the ledger.
    fn block_time(&self, state: &LedgerState, block: BlockNumber) -> Result<Option<(usize, Timestamp)>, LedgerError> {
        let current = self.clock.block_number();
        if block > current {
            return Err(LedgerError::FutureBlock { requested: block, current });
        }
        let history = &state.point_history;
        let Some(idx) = latest_at_or_before(history, |p| p.blk, block) else {
            return Ok(None);
        };
        let p0 = history[idx];
        let (d_blk, d_ts) = match history.get(idx + 1) {
            Some(p1) => (p1.blk - p0.blk, p1.ts - p0.ts),
            None => (current.saturating_sub(p0.blk), self.clock.now().saturating_sub(p0.ts)),
        };
        let offset = if d_blk == 0 {
            0
        } else {
            ((d_ts as u128) * ((block - p0.blk) as u128) / (d_blk as u128)) as u64
        };
        Ok(Some((idx, p0.ts + offset)))
    }
}

impl VotingPowerOracle for LockLedger {
    fn balance_of(&self, account: &Address) -> Result<Amount, LedgerError> {
        LockLedger::balance_of(self, account)
    }

    fn total_supply(&self) -> Result<Amount, LedgerError> {
        LockLedger::total_supply(self)
    }

    fn balance_of_at_time(&self, account: &Address, ts: Timestamp) -> Result<Amount, LedgerError> {
        LockLedger::balance_of_at_time(self, account, ts)
    }

    fn total_supply_at_time(&self, ts: Timestamp) -> Result<Amount, LedgerError> {
        LockLedger::total_supply_at_time(self, ts)
    }
}

impl LockEscrow for LockLedger {
    fn address(&self) -> Address {
        LockLedger::address(self)
    }

    fn deposit_for(&self, funder: &Address, account: &Address, amount: Amount) -> Result<(), LedgerError> {
        LockLedger::deposit_for(self, funder, account, amount).map(|_| ())
    }

    fn locked(&self, account: &Address) -> LockedBalance {
        LockLedger::locked(self, account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use proptest::prelude::*;
    use ve_core::constants::{COIN, MAXTIME, WEEK};
    use ve_core::traits::{Clock, FungibleToken};
    use ve_core::{ManualClock, MemoryToken};

    use crate::ledger::LedgerConfig;

    const START: Timestamp = 100 * WEEK;

    fn addr(n: u8) -> Address {
        Address([n; 20])
    }

    fn setup() -> (Arc<ManualClock>, LockLedger) {
        let clock = Arc::new(ManualClock::new(START));
        let token = Arc::new(MemoryToken::new("VE"));
        for n in 1..=8 {
            token.mint(&addr(n), 1_000_000 * COIN).unwrap();
        }
        let ledger =
            LockLedger::new(LedgerConfig::default(), token, clock.clone(), addr(0xEE), addr(0xAD)).unwrap();
        (clock, ledger)
    }

    // --- time-indexed ---

    #[test]
    fn full_length_lock_reads_back_its_amount() {
        let (clock, ledger) = setup();
        let a = addr(1);
        ledger.create_lock(&a, 1_000 * COIN, START + MAXTIME).unwrap();
        assert_eq!(ledger.balance_of(&a).unwrap(), 1_000 * COIN);
        assert_eq!(ledger.total_supply().unwrap(), 1_000 * COIN);
        clock.advance(MAXTIME);
        assert_eq!(ledger.balance_of(&a).unwrap(), 0);
        assert_eq!(ledger.total_supply().unwrap(), 0);
    }

    #[test]
    fn balance_is_proportional_to_remaining_time() {
        let (_, ledger) = setup();
        let a = addr(1);
        ledger.create_lock(&a, 1_000 * COIN, START + MAXTIME / 4).unwrap();
        assert_eq!(ledger.balance_of(&a).unwrap(), 250 * COIN);
        assert_eq!(ledger.balance_of_at_time(&a, START + MAXTIME / 8).unwrap(), 125 * COIN);
    }

    #[test]
    fn historical_reads_survive_later_mutations() {
        let (clock, ledger) = setup();
        let a = addr(1);
        ledger.create_lock(&a, 100 * COIN, START + 4 * WEEK).unwrap();
        let at_start = ledger.balance_of(&a).unwrap();
        let supply_at_start = ledger.total_supply().unwrap();

        clock.advance(WEEK);
        ledger.increase_unlock_time(&a, START + 40 * WEEK).unwrap();
        ledger.increase_amount(&a, 50 * COIN).unwrap();

        assert_eq!(ledger.balance_of_at_time(&a, START).unwrap(), at_start);
        assert_eq!(ledger.total_supply_at_time(START).unwrap(), supply_at_start);
        // before the ledger existed
        assert_eq!(ledger.total_supply_at_time(START - 1).unwrap(), 0);
        assert_eq!(ledger.balance_of_at_time(&a, START - 1).unwrap(), 0);
    }

    #[test]
    fn total_supply_projects_across_unrecorded_weeks() {
        let (_, ledger) = setup();
        ledger.create_lock(&addr(1), 10 * COIN, START + WEEK).unwrap();
        ledger.create_lock(&addr(2), 10 * COIN, START + 2 * WEEK).unwrap();
        // no checkpoint at START + WEEK, the schedule still removes addr(1)
        let later = START + WEEK + WEEK / 2;
        assert_eq!(ledger.balance_of_at_time(&addr(1), later).unwrap(), 0);
        assert_eq!(
            ledger.total_supply_at_time(later).unwrap(),
            ledger.balance_of_at_time(&addr(2), later).unwrap()
        );
    }

    #[test]
    fn unknown_account_has_no_power() {
        let (_, ledger) = setup();
        assert_eq!(ledger.balance_of(&addr(42)).unwrap(), 0);
    }

    // --- block-indexed ---

    #[test]
    fn block_queries_reject_future_blocks() {
        let (clock, ledger) = setup();
        let current = clock.block_number();
        assert_eq!(
            ledger.balance_of_at(&addr(1), current + 1),
            Err(LedgerError::FutureBlock { requested: current + 1, current })
        );
        assert!(ledger.total_supply_at(current + 5).is_err());
    }

    #[test]
    fn block_queries_interpolate_between_checkpoints() {
        let (clock, ledger) = setup();
        let a = addr(1);
        ledger.create_lock(&a, 100 * COIN, START + 10 * WEEK).unwrap();
        let lock_block = clock.block_number();
        // 10 blocks spanning exactly one week, then checkpoint
        clock.advance_blocks(10, WEEK / 10);
        ledger.checkpoint().unwrap();

        let mid_block = lock_block + 5;
        let mid_time = START + WEEK / 2;
        assert_eq!(ledger.balance_of_at(&a, mid_block).unwrap(), ledger.balance_of_at_time(&a, mid_time).unwrap());
        assert_eq!(ledger.total_supply_at(mid_block).unwrap(), ledger.total_supply_at_time(mid_time).unwrap());
        assert_eq!(ledger.balance_of_at(&a, lock_block).unwrap(), ledger.balance_of_at_time(&a, START).unwrap());
    }

    #[test]
    fn block_queries_past_last_checkpoint_use_the_clock() {
        let (clock, ledger) = setup();
        let a = addr(1);
        ledger.create_lock(&a, 100 * COIN, START + 10 * WEEK).unwrap();
        clock.advance_blocks(4, WEEK / 4);
        let now_block = clock.block_number();
        assert_eq!(ledger.balance_of_at(&a, now_block).unwrap(), ledger.balance_of(&a).unwrap());
    }

    #[test]
    fn migration_zeroes_historical_reads() {
        let (clock, ledger) = setup();
        ledger.create_lock(&addr(1), COIN, START + 10 * WEEK).unwrap();
        let blk = clock.block_number();
        ledger.set_next_ve_contract(&addr(0xAD), addr(7)).unwrap();
        assert_eq!(ledger.balance_of_at(&addr(1), blk).unwrap(), 0);
        assert_eq!(ledger.total_supply_at(blk).unwrap(), 0);
        assert_eq!(ledger.total_supply_at_time(START).unwrap(), 0);
    }

    // --- trait surfaces ---

    #[test]
    fn escrow_trait_tops_up_active_lock() {
        let (_, ledger) = setup();
        ledger.create_lock(&addr(1), COIN, START + 10 * WEEK).unwrap();
        let escrow: &dyn LockEscrow = &ledger;
        escrow.deposit_for(&addr(2), &addr(1), COIN).unwrap();
        assert_eq!(escrow.locked(&addr(1)).amount, 2 * COIN);
        assert_eq!(ledger.token().balance_of(&ledger.address()), 2 * COIN);
    }

    // --- invariants ---

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn supply_tracks_sum_of_balances(
            locks in prop::collection::vec((1u128..1_000_000, 1u64..210, 0u64..WEEK), 1..6),
            probes in prop::collection::vec(0u64..220, 1..6),
        ) {
            let (clock, ledger) = setup();
            for (i, (amount, weeks, jitter)) in locks.iter().enumerate() {
                let account = addr(i as u8 + 1);
                ledger.create_lock(&account, amount * COIN, START + weeks * WEEK + jitter).unwrap();
                clock.advance(jitter / 7);
            }
            let n = locks.len() as u128;
            for w in probes {
                let t = clock.now() + w * WEEK;
                let total = ledger.total_supply_at_time(t).unwrap();
                let sum: u128 = (0..locks.len())
                    .map(|i| ledger.balance_of_at_time(&addr(i as u8 + 1), t).unwrap())
                    .sum();
                prop_assert!(total >= sum);
                prop_assert!(total - sum < n);
            }
        }

        #[test]
        fn balance_never_increases_between_mutations(
            amount in 1u128..1_000_000,
            weeks in 1u64..208,
            steps in prop::collection::vec(1u64..WEEK * 4, 1..10),
        ) {
            let (_, ledger) = setup();
            let a = addr(1);
            let lock = ledger.create_lock(&a, amount * COIN, START + weeks * WEEK).unwrap();
            let mut t = START;
            let mut prev = ledger.balance_of_at_time(&a, t).unwrap();
            for dt in steps {
                t += dt;
                let cur = ledger.balance_of_at_time(&a, t).unwrap();
                prop_assert!(cur <= prev);
                if t >= lock.end {
                    prop_assert_eq!(cur, 0);
                }
                prev = cur;
            }
        }
    }
}
