//! # ve-core
//! Foundation types and traits for the vote-escrow protocol.
//!
//! Everything here is shared by the ledger, gauge and voter crates:
//! - [`types`]: addresses, checkpoints, lock records, capability sets
//! - [`constants`]: week/lock-time arithmetic and fixed-point scales
//! - [`math`]: 256-bit `mul_div` for reward and boost arithmetic
//! - [`traits`]: collaborator interfaces (clock, token, oracle, escrow)
//! - [`clock`], [`token`]: deterministic in-memory collaborators
//! - [`management`]: two-step admin transfer

pub mod clock;
pub mod constants;
pub mod error;
pub mod management;
pub mod math;
pub mod token;
pub mod traits;
pub mod types;

pub use clock::ManualClock;
pub use management::Management;
pub use token::MemoryToken;
pub use types::{Address, Amount, BlockNumber, Capabilities, LockedBalance, Point, Timestamp};
