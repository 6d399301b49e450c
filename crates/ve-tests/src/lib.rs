//! Cross-crate test suite for the vote-escrow protocol.
//!
//! The integration tests under `tests/` wire the real ledger, reward pool,
//! registry, gauges and voter together and check the protocol invariants
//! end to end, including under randomized inputs.

pub mod helpers;
