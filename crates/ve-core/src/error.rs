//! Error types for the vote-escrow protocol.
use thiserror::Error;

use crate::types::{Address, Amount, Timestamp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("division by zero")] DivisionByZero,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance for {account}: have {have}, need {need}")] InsufficientBalance { account: Address, have: Amount, need: Amount },
    #[error("token supply overflow")] Overflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("not management: {0}")] NotManagement(Address),
    #[error("not pending management: {0}")] NotPendingManagement(Address),
    #[error("zero address")] ZeroAddress,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid lock: {0}")] InvalidLock(&'static str),
    #[error("lock active until {end}, now {now}")] LockActive { end: Timestamp, now: Timestamp },
    #[error("zero amount")] ZeroAmount,
    #[error("stale checkpoint: {weeks_behind} weeks behind, call checkpoint() first")] StaleCheckpoint { weeks_behind: u64 },
    #[error("ledger migrated")] Migrated,
    #[error("future block: requested {requested}, current {current}")] FutureBlock { requested: u64, current: u64 },
    #[error("invalid config: {0}")] InvalidConfig(&'static str),
    #[error(transparent)] Access(#[from] AccessError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("zero amount")] ZeroAmount,
    #[error("not allowed to {0}")] NotAuthorized(&'static str),
    #[error("invalid parameter: {0}")] InvalidParameter(&'static str),
    #[error("insufficient deposit: have {have}, need {need}")] InsufficientDeposit { have: Amount, need: Amount },
    #[error("gauge already exists for vault {0}")] GaugeExists(Address),
    #[error("unknown vault {0}")] UnknownVault(Address),
    #[error("extra reward already added for token {0}")] ExtraRewardExists(Address),
    #[error("extra reward not found for token {0}")] UnknownExtraReward(Address),
    #[error("token {0} cannot be swept")] ProtectedToken(Address),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] Access(#[from] AccessError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("length mismatch: {targets} targets, {weights} weights")] LengthMismatch { targets: usize, weights: usize },
    #[error("insufficient power: have {available}, requested {requested}")] InsufficientPower { available: Amount, requested: u128 },
    #[error("weights sum to zero")] ZeroWeight,
    #[error("not authorized to vote for {0}")] NotAuthorized(Address),
    #[error("delegation locked until {until}")] DelegationLocked { until: Timestamp },
    #[error("must increase: current {current}, requested {requested}")] MustIncrease { current: Timestamp, requested: Timestamp },
    #[error("invalid delegation: {0}")] InvalidDelegation(&'static str),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] Math(#[from] MathError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_convert_with_question_mark() {
        fn inner() -> Result<(), MathError> {
            Err(MathError::Overflow)
        }
        fn outer() -> Result<(), RewardError> {
            inner()?;
            Ok(())
        }
        assert_eq!(outer(), Err(RewardError::Math(MathError::Overflow)));
    }

    #[test]
    fn nested_errors_display_transparently() {
        let e: RewardError = LedgerError::InvalidLock("lock expired").into();
        assert_eq!(e.to_string(), "invalid lock: lock expired");
    }

    #[test]
    fn authorization_message_names_the_action() {
        assert_eq!(RewardError::NotAuthorized("claim").to_string(), "not allowed to claim");
    }
}
