//! Trait interfaces between the protocol crates.
//!
//! - [`Clock`]: externally supplied time and block height
//! - [`FungibleToken`]: opaque balance ledger for locked, reward and vault tokens
//! - [`VotingPowerOracle`]: decaying voting power (ve-ledger implements)
//! - [`LockEscrow`]: lock top-ups on an account's behalf (ve-ledger implements)
//! - [`PenaltySink`]: destination for early-exit and boost penalties (ve-gauge's reward pool implements)
//! - [`TargetRegistry`]: which vote targets are currently eligible (ve-gauge's registry implements)

use crate::error::{LedgerError, TokenError};
use crate::types::{Address, Amount, BlockNumber, LockedBalance, Timestamp};

/// Source of "now". Never read from the wall clock inside the protocol.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    fn block_number(&self) -> BlockNumber;
}

/// A fungible balance ledger.
///
/// Every mutating call either applies completely or fails leaving all
/// balances untouched.
pub trait FungibleToken: Send + Sync {
    fn address(&self) -> Address;

    fn balance_of(&self, account: &Address) -> Amount;

    fn total_supply(&self) -> Amount;

    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError>;

    /// Pay several recipients from one account as a single unit.
    ///
    /// Fails without moving anything if `from` cannot cover the sum.
    fn transfer_many(&self, from: &Address, outputs: &[(Address, Amount)]) -> Result<(), TokenError>;

    fn mint(&self, to: &Address, amount: Amount) -> Result<(), TokenError>;

    fn burn(&self, from: &Address, amount: Amount) -> Result<(), TokenError>;
}

/// Read-only voting power over the lock ledger.
pub trait VotingPowerOracle: Send + Sync {
    /// Current voting power of `account`.
    fn balance_of(&self, account: &Address) -> Result<Amount, LedgerError>;

    /// Current total voting power.
    fn total_supply(&self) -> Result<Amount, LedgerError>;

    /// Voting power of `account` at `ts` (past or future).
    fn balance_of_at_time(&self, account: &Address, ts: Timestamp) -> Result<Amount, LedgerError>;

    /// Total voting power at `ts` (past or future).
    fn total_supply_at_time(&self, ts: Timestamp) -> Result<Amount, LedgerError>;
}

/// Lock top-ups performed by another party (a gauge re-locking a claim).
pub trait LockEscrow: Send + Sync {
    fn address(&self) -> Address;

    /// Move `amount` of the locked token from `funder` into `account`'s active lock.
    fn deposit_for(&self, funder: &Address, account: &Address, amount: Amount) -> Result<(), LedgerError>;

    fn locked(&self, account: &Address) -> LockedBalance;
}

/// Receives penalties and redistributes them to lock holders.
pub trait PenaltySink: Send + Sync {
    fn address(&self) -> Address;

    /// Record `amount` tokens that `from` has already transferred to [`address`](Self::address).
    fn receive_penalty(&self, from: &Address, amount: Amount);
}

/// Eligibility of vote targets.
pub trait TargetRegistry: Send + Sync {
    fn is_eligible(&self, target: &Address) -> bool;
}
