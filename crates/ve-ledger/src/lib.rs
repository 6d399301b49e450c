//! # ve-ledger — Vote-escrow lock ledger.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! - **Locks**: one lock per account, `amount` plus a week-aligned unlock
//!   time, bounded by `max_lock_time`. Power decays linearly to zero at the
//!   unlock time.
//! - **Global curve**: the sum of all lock curves, checkpointed on every
//!   mutation and at every week boundary crossed, with slope changes
//!   scheduled at lock ends.
//! - **Bounded walks**: catching the global curve up to "now" takes at most
//!   `max_walk_weeks` iterations; a staler ledger needs explicit
//!   `checkpoint()` calls.
//! - **Oracle**: current and historical balances and supply by timestamp
//!   (exact) or block (interpolated).

pub mod curve;
pub mod history;
pub mod ledger;

pub use ledger::{CheckpointOutcome, LedgerConfig, LockLedger, Withdrawal};
