//! Deterministic clock for tests and the simulator.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::traits::Clock;
use crate::types::{BlockNumber, Timestamp};

/// A clock that only moves when told to.
///
/// Every [`advance`](Self::advance) mines exactly one block, so block height
/// and time move together the way a chain would.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
    block: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { now: AtomicU64::new(start), block: AtomicU64::new(1) }
    }

    /// Move time forward by `secs` and mine one block.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
        self.block.fetch_add(1, Ordering::SeqCst);
    }

    /// Mine `n` blocks, `secs_per_block` apart.
    pub fn advance_blocks(&self, n: u64, secs_per_block: u64) {
        self.now.fetch_add(n.saturating_mul(secs_per_block), Ordering::SeqCst);
        self.block.fetch_add(n, Ordering::SeqCst);
    }

    /// Jump to an absolute time (must not go backwards) and mine one block.
    pub fn set(&self, ts: Timestamp) {
        let current = self.now.load(Ordering::SeqCst);
        if ts > current {
            self.advance(ts - current);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    fn block_number(&self) -> BlockNumber {
        self.block.load(Ordering::SeqCst)
    }
}
