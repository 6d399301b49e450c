//! Adversarial property-based test suite.
//!
//! Each property drives the wired protocol with a random operation sequence
//! and checks invariants after every step. Operations that the protocol
//! rejects are simply skipped: a rejection must leave state untouched, which
//! the invariants then cover as well.
//!
//! Attack vectors tested:
//! - Reward inflation through deposit/withdraw/claim/kick interleavings,
//!   for the main reward and an extra reward stream
//! - Boosts exceeding the raw deposit
//! - Non-idempotent global checkpoints
//! - Vote tallies drifting from per-account allocations
//! - Reward pool paying out more than it received

use std::sync::Arc;

use proptest::prelude::*;
use ve_core::constants::{COIN, DAY, MAXTIME, WEEK};
use ve_core::traits::FungibleToken;
use ve_core::types::Address;
use ve_core::MemoryToken;
use ve_gauge::{BoostPolicy, Gauge, GaugeConfig, PenaltyCurve};
use ve_ledger::LedgerConfig;
use ve_tests::helpers::*;

const ACCOUNTS: u8 = 4;

fn account(i: u8) -> Address {
    addr(i % ACCOUNTS + 1)
}

fn policy_strategy() -> impl Strategy<Value = BoostPolicy> {
    prop_oneof![
        (100u128..10_000).prop_map(|floor_bps| BoostPolicy::Floor { floor_bps }),
        Just(BoostPolicy::PenaltyRedirect { curve: PenaltyCurve::Linear }),
        Just(BoostPolicy::PenaltyRedirect { curve: PenaltyCurve::Quadratic }),
    ]
}

// ---------------------------------------------------------------------------
// Gauge: reward conservation and boost clamp
//
// Attack vector: an adversary interleaves deposits, partial withdrawals,
// claims (as tokens or into a lock), kicks and reward top-ups to extract
// more than was ever queued, or to hold a boost above its raw deposit.
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum GaugeOp {
    Lock { who: u8, amount: u128, weeks: u64 },
    Deposit { who: u8, amount: u128 },
    Withdraw { who: u8, percent: u128, claim: bool },
    Claim { who: u8, as_lock: bool },
    Queue { amount: u128 },
    QueueExtra { amount: u128 },
    Kick,
    Sweep,
    Advance { secs: u64 },
}

fn gauge_op() -> impl Strategy<Value = GaugeOp> {
    prop_oneof![
        (any::<u8>(), 1u128..1_000, 1u64..208).prop_map(|(who, amount, weeks)| GaugeOp::Lock { who, amount, weeks }),
        (any::<u8>(), 1u128..10_000).prop_map(|(who, amount)| GaugeOp::Deposit { who, amount }),
        (any::<u8>(), 1u128..=100, any::<bool>()).prop_map(|(who, percent, claim)| GaugeOp::Withdraw { who, percent, claim }),
        (any::<u8>(), any::<bool>()).prop_map(|(who, as_lock)| GaugeOp::Claim { who, as_lock }),
        (1u128..1_000_000).prop_map(|amount| GaugeOp::Queue { amount }),
        (1u128..1_000_000).prop_map(|amount| GaugeOp::QueueExtra { amount }),
        Just(GaugeOp::Kick),
        Just(GaugeOp::Sweep),
        (1u64..3 * WEEK).prop_map(|secs| GaugeOp::Advance { secs }),
    ]
}

struct GaugeRun {
    h: Harness,
    vault: Arc<MemoryToken>,
    gauge: Arc<Gauge>,
    extra: Arc<MemoryToken>,
    queued: u128,
    paid_out: u128,
    extra_queued: u128,
}

impl GaugeRun {
    fn new(policy: BoostPolicy) -> Self {
        let h = Harness::with_config(LedgerConfig::default(), GaugeConfig { boost: policy, ..GaugeConfig::default() });
        let (vault, gauge) = h.add_vault("yvA");
        let extra = Arc::new(MemoryToken::new("YFO"));
        gauge.add_extra_reward(&admin(), extra.clone()).unwrap();
        Self { h, vault, gauge, extra, queued: 0, paid_out: 0, extra_queued: 0 }
    }

    fn apply(&mut self, op: &GaugeOp) {
        let h = &self.h;
        match *op {
            GaugeOp::Lock { who, amount, weeks } => {
                let who = account(who);
                if h.ledger.locked(&who).amount == 0 {
                    h.fund(&who, amount * COIN);
                    let _ = h.ledger.create_lock(&who, amount * COIN, h.now() + weeks * WEEK);
                }
            }
            GaugeOp::Deposit { who, amount } => {
                let who = account(who);
                self.vault.mint(&who, amount * COIN).unwrap();
                let _ = self.gauge.deposit(&who, amount * COIN, None);
            }
            GaugeOp::Withdraw { who, percent, claim } => {
                let who = account(who);
                let amount = self.gauge.balance_of(&who) * percent / 100;
                if let Ok(reward) = self.gauge.withdraw(&who, amount, claim, false) {
                    self.paid_out += reward;
                }
            }
            GaugeOp::Claim { who, as_lock } => {
                if let Ok(reward) = self.gauge.get_reward(&account(who), as_lock) {
                    self.paid_out += reward;
                }
            }
            GaugeOp::Queue { amount } => {
                let funder = addr(0xF0);
                h.fund(&funder, amount * COIN);
                if self.gauge.queue_new_rewards(&funder, amount * COIN).is_ok() {
                    self.queued += amount * COIN;
                }
            }
            GaugeOp::QueueExtra { amount } => {
                let funder = addr(0xF1);
                self.extra.mint(&funder, amount * COIN).unwrap();
                if self.gauge.queue_extra_rewards(&funder, &self.extra.address(), amount * COIN).is_ok() {
                    self.extra_queued += amount * COIN;
                }
            }
            GaugeOp::Kick => {
                let all: Vec<_> = (0..ACCOUNTS).map(account).collect();
                let _ = self.gauge.kick(&all);
            }
            GaugeOp::Sweep => {
                if let Ok(swept) = self.gauge.transfer_queued_penalty() {
                    self.paid_out += swept;
                }
            }
            GaugeOp::Advance { secs } => h.clock.advance(secs),
        }
    }

    fn check(&self) -> Result<(), TestCaseError> {
        let gauge = &self.gauge;
        let held = self.h.token.balance_of(&gauge.address());
        prop_assert_eq!(held + self.paid_out, self.queued, "reward tokens appeared or vanished");

        let mut owed = gauge.queued_rewards() + gauge.queued_penalty();
        let mut deposits = 0;
        for i in 0..ACCOUNTS {
            let who = account(i);
            let balance = gauge.balance_of(&who);
            prop_assert!(gauge.boosted_balance_of(&who) <= balance, "boost above raw deposit");
            owed += gauge.earned(&who).unwrap();
            deposits += balance;
        }
        prop_assert!(owed <= held, "owed {} exceeds held {}", owed, held);
        prop_assert_eq!(gauge.total_supply(), deposits);
        prop_assert_eq!(self.vault.balance_of(&gauge.address()), deposits);

        // extra rewards only ever leave the gauge towards depositors
        let extra = self.extra.address();
        let extra_held = self.extra.balance_of(&gauge.address());
        let extra_paid: u128 = (0..ACCOUNTS).map(|i| self.extra.balance_of(&account(i))).sum();
        prop_assert_eq!(extra_held + extra_paid, self.extra_queued, "extra tokens appeared or vanished");
        let mut extra_owed = gauge.extra_rewards()[0].queued_rewards;
        for i in 0..ACCOUNTS {
            extra_owed += gauge.extra_earned(&account(i), &extra).unwrap();
        }
        prop_assert!(extra_owed <= extra_held, "extra owed {} exceeds held {}", extra_owed, extra_held);
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn gauge_never_pays_more_than_queued(
        policy in policy_strategy(),
        ops in prop::collection::vec(gauge_op(), 1..40),
    ) {
        let mut run = GaugeRun::new(policy);
        for op in &ops {
            run.apply(op);
            run.check()?;
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger: checkpoint idempotence under interleaved lock activity
//
// Attack vector: repeated checkpoints without time passing append or alter
// history, skewing later historical lookups.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn checkpoint_twice_is_idempotent(
        locks in prop::collection::vec((1u128..1_000, 1u64..208, 0u64..2 * WEEK), 1..8),
        idle in 0u64..60,
    ) {
        let h = Harness::new();
        for (i, (amount, weeks, gap)) in locks.iter().enumerate() {
            let who = addr(i as u8 + 1);
            h.lock(&who, amount * COIN, weeks * WEEK);
            h.clock.advance(*gap);
        }
        h.clock.advance(idle * WEEK);

        let first = h.ledger.checkpoint().unwrap();
        prop_assert!(first.caught_up);
        let epoch = h.ledger.epoch();
        let head = h.ledger.point_history(epoch);
        let supply = h.ledger.total_supply().unwrap();

        let second = h.ledger.checkpoint().unwrap();
        prop_assert!(second.caught_up);
        prop_assert_eq!(h.ledger.epoch(), epoch);
        prop_assert_eq!(h.ledger.point_history(epoch), head);
        prop_assert_eq!(h.ledger.total_supply().unwrap(), supply);
    }

    #[test]
    fn fresh_lock_reads_back_scaled_amount(
        amount in 1u128..1_000_000,
        weeks in 1u64..=208,
        offset in 0u64..WEEK,
    ) {
        let h = Harness::new();
        h.clock.advance(offset);
        let who = addr(1);
        let lock = h.lock(&who, amount * COIN, weeks * WEEK);
        let remaining = (lock.end - h.now()) as u128;
        let expected = amount * COIN * remaining.min(MAXTIME as u128) / MAXTIME as u128;
        prop_assert_eq!(h.ledger.balance_of(&who).unwrap(), expected);
    }
}

// ---------------------------------------------------------------------------
// Voter: tallies stay consistent with per-account allocations
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn vote_tallies_match_allocations(
        votes in prop::collection::vec(
            (any::<u8>(), prop::collection::vec((0usize..3, 0u128..10_000), 0..4)),
            1..20,
        ),
        steps in prop::collection::vec(0u64..4 * WEEK, 1..20),
    ) {
        let h = Harness::new();
        for i in 0..ACCOUNTS {
            h.lock(&account(i), (i as u128 + 1) * 100 * COIN, 52 * WEEK);
        }
        let mut targets: Vec<Address> = ["yvA", "yvB"].iter().map(|s| h.add_vault(s).0.address()).collect();
        // A target that never becomes eligible.
        targets.push(addr(0xEE));

        for ((who, ballot), dt) in votes.iter().zip(steps.iter().cycle()) {
            let who = account(*who);
            let (ts, ws): (Vec<_>, Vec<_>) = ballot.iter().map(|(t, w)| (targets[*t], *w)).unzip();
            let _ = h.voter.vote(&who, &ts, &ws);
            h.clock.advance(*dt);
            let _ = h.voter.poke(&account(who.0[0].wrapping_add(1)));

            let used: u128 = (0..ACCOUNTS).map(|i| h.voter.used_weights(&account(i))).sum();
            let tallied: u128 = targets.iter().map(|t| h.voter.weights(t)).sum();
            prop_assert_eq!(h.voter.total_weight(), used);
            prop_assert_eq!(h.voter.total_weight(), tallied);
            prop_assert_eq!(h.voter.weights(&addr(0xEE)), 0);
        }
    }
}

// ---------------------------------------------------------------------------
// Reward pool: solvency
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn reward_pool_stays_solvent(
        locks in prop::collection::vec((1u128..1_000, 1u64..100), 1..=4),
        ops in prop::collection::vec((0u8..3, any::<u8>(), 1u128..1_000, 1u64..10 * DAY), 1..40),
    ) {
        let h = Harness::new();
        for (i, (amount, weeks)) in locks.iter().enumerate() {
            h.lock(&account(i as u8), amount * COIN, weeks * WEEK);
        }
        let funder = addr(0xF0);
        for (kind, who, amount, secs) in ops {
            match kind {
                0 => {
                    h.fund(&funder, amount * COIN);
                    h.pool.burn(&funder, amount * COIN).unwrap();
                }
                1 => {
                    h.pool.claim(&account(who)).unwrap();
                }
                _ => h.clock.advance(secs),
            }
            let held = h.token.balance_of(&h.pool.address());
            prop_assert!(h.pool.total_claimed() <= h.pool.total_received());
            prop_assert_eq!(held, h.pool.total_received() - h.pool.total_claimed());
        }
    }
}
