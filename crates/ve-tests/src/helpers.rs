//! Shared test helpers: deterministic addresses and a fully wired protocol.

use std::sync::Arc;

use ve_core::constants::WEEK;
use ve_core::traits::{Clock, FungibleToken};
use ve_core::types::{Address, Amount, LockedBalance, Timestamp};
use ve_core::{ManualClock, MemoryToken};
use ve_gauge::{Gauge, GaugeConfig, GaugeContext, Registry, RewardPool, StandardGaugeFactory};
use ve_ledger::{LedgerConfig, LockLedger};
use ve_voter::{VoteDelegation, Voter};

/// Week-aligned start time used by every harness.
pub const START: Timestamp = 100 * WEEK;

/// Simple address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address([seed; 20])
}

/// Management of every instance in the harness.
pub fn admin() -> Address {
    Address::from_name("admin")
}

/// The whole protocol over one token and a manual clock.
///
/// The locked token doubles as the gauge reward token, so claim-as-lock and
/// penalty sweeps move the same asset the ledger holds.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub token: Arc<MemoryToken>,
    pub ledger: Arc<LockLedger>,
    pub pool: Arc<RewardPool>,
    pub registry: Arc<Registry>,
    pub delegation: Arc<VoteDelegation>,
    pub voter: Arc<Voter>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default(), GaugeConfig::default())
    }

    pub fn with_config(ledger_config: LedgerConfig, gauge_config: GaugeConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let token = Arc::new(MemoryToken::new("VE"));
        let ledger = Arc::new(
            LockLedger::new(ledger_config, token.clone(), clock.clone(), Address::from_name("ledger"), admin())
                .expect("ledger"),
        );
        let pool = Arc::new(RewardPool::new(
            Address::from_name("reward-pool"),
            token.clone(),
            ledger.clone(),
            clock.clone(),
        ));
        ledger.set_penalty_recipient(&admin(), pool.clone()).expect("penalty recipient");

        let ctx = GaugeContext {
            clock: clock.clone(),
            oracle: ledger.clone(),
            escrow: ledger.clone(),
            reward_token: token.clone(),
            penalty_sink: pool.clone(),
        };
        let factory = StandardGaugeFactory::new(gauge_config, ctx).expect("gauge factory");
        let registry = Arc::new(Registry::new(Arc::new(factory), admin()).expect("registry"));
        let delegation = Arc::new(VoteDelegation::new(clock.clone()));
        let voter = Arc::new(Voter::new(ledger.clone(), registry.clone(), delegation.clone()));
        Self { clock, token, ledger, pool, registry, delegation, voter }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Mint `amount` of the protocol token to `who`.
    pub fn fund(&self, who: &Address, amount: Amount) {
        self.token.mint(who, amount).expect("mint");
    }

    /// Mint and lock `amount` for `who` until `now + duration`.
    pub fn lock(&self, who: &Address, amount: Amount, duration: u64) -> LockedBalance {
        self.fund(who, amount);
        self.ledger.create_lock(who, amount, self.now() + duration).expect("create lock")
    }

    /// Register a fresh vault token and return it with its gauge.
    pub fn add_vault(&self, symbol: &str) -> (Arc<MemoryToken>, Arc<Gauge>) {
        let vault = Arc::new(MemoryToken::new(symbol));
        let gauge = self.registry.add_vault_to_rewards(&admin(), vault.clone()).expect("add vault");
        (vault, gauge)
    }

    /// Mint vault tokens to `who` and deposit them into `gauge`.
    pub fn deposit(&self, vault: &MemoryToken, gauge: &Gauge, who: &Address, amount: Amount) {
        vault.mint(who, amount).expect("mint vault");
        gauge.deposit(who, amount, None).expect("deposit");
    }

    /// Fund `gauge` with `amount` reward tokens from a dedicated funder.
    pub fn queue_rewards(&self, gauge: &Gauge, amount: Amount) {
        let funder = Address::from_name("rewards-funder");
        self.fund(&funder, amount);
        gauge.queue_new_rewards(&funder, amount).expect("queue rewards");
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
