//! # ve-voter — Vote/weight allocation.
//!
//! Holders of voting power split it across eligible targets (gauges) with
//! [`Voter`], optionally letting a delegate cast votes for them through
//! [`VoteDelegation`].

pub mod delegation;
pub mod voter;

pub use delegation::{Delegation, VoteDelegation};
pub use voter::{Ballot, Voter};
