//! Gauge registry: which vaults have reward gauges. Registered vaults are the
//! eligible vote targets; weight voted for a vault directs emissions to its
//! gauge.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use ve_core::error::RewardError;
use ve_core::management::Management;
use ve_core::traits::{FungibleToken, TargetRegistry};
use ve_core::types::Address;

use crate::gauge::{Gauge, GaugeConfig, GaugeContext};

/// Creates gauges for newly registered vaults.
pub trait GaugeFactory: Send + Sync {
    fn create_gauge(&self, vault: Arc<dyn FungibleToken>, management: Address) -> Result<Arc<Gauge>, RewardError>;
}

/// Builds every gauge from one config and collaborator set. Gauge addresses
/// are derived from the vault address, so one vault always maps to the same
/// gauge address.
pub struct StandardGaugeFactory {
    config: GaugeConfig,
    ctx: GaugeContext,
}

impl StandardGaugeFactory {
    pub fn new(config: GaugeConfig, ctx: GaugeContext) -> Result<Self, RewardError> {
        config.validate()?;
        Ok(Self { config, ctx })
    }

    pub fn gauge_address(vault: &Address) -> Address {
        Address::derive("ve/gauge", vault.as_bytes())
    }
}

impl GaugeFactory for StandardGaugeFactory {
    fn create_gauge(&self, vault: Arc<dyn FungibleToken>, management: Address) -> Result<Arc<Gauge>, RewardError> {
        let address = Self::gauge_address(&vault.address());
        let gauge = Gauge::new(address, vault, self.config, self.ctx.clone(), management)?;
        Ok(Arc::new(gauge))
    }
}

struct RegistryState {
    gauges: HashMap<Address, Arc<Gauge>>,
    vault_for_gauge: HashMap<Address, Address>,
    vaults: Vec<Address>,
    management: Management,
}

pub struct Registry {
    factory: Arc<dyn GaugeFactory>,
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new(factory: Arc<dyn GaugeFactory>, management: Address) -> Result<Self, RewardError> {
        let state = RegistryState {
            gauges: HashMap::new(),
            vault_for_gauge: HashMap::new(),
            vaults: Vec::new(),
            management: Management::new(management)?,
        };
        Ok(Self { factory, state: RwLock::new(state) })
    }

    /// Create and register a gauge for `vault`. The gauge inherits the
    /// registry's current management.
    pub fn add_vault_to_rewards(&self, caller: &Address, vault: Arc<dyn FungibleToken>) -> Result<Arc<Gauge>, RewardError> {
        let mut state = self.state.write();
        state.management.ensure(caller)?;
        let vault_address = vault.address();
        if state.gauges.contains_key(&vault_address) {
            return Err(RewardError::GaugeExists(vault_address));
        }
        let gauge = self.factory.create_gauge(vault, state.management.current())?;
        state.gauges.insert(vault_address, Arc::clone(&gauge));
        state.vault_for_gauge.insert(gauge.address(), vault_address);
        state.vaults.push(vault_address);
        info!(vault = %vault_address, gauge = %gauge.address(), "vault added to rewards");
        Ok(gauge)
    }

    /// Unregister `vault`. Its gauge keeps working for existing depositors
    /// but the vault stops being an eligible vote target.
    pub fn remove_vault_from_rewards(&self, caller: &Address, vault: &Address) -> Result<Arc<Gauge>, RewardError> {
        let mut state = self.state.write();
        state.management.ensure(caller)?;
        let gauge = state.gauges.remove(vault).ok_or(RewardError::UnknownVault(*vault))?;
        state.vault_for_gauge.remove(&gauge.address());
        state.vaults.retain(|v| v != vault);
        info!(%vault, gauge = %gauge.address(), "vault removed from rewards");
        Ok(gauge)
    }

    pub fn gauge_for(&self, vault: &Address) -> Option<Arc<Gauge>> {
        self.state.read().gauges.get(vault).cloned()
    }

    pub fn vault_for_gauge(&self, gauge: &Address) -> Option<Address> {
        self.state.read().vault_for_gauge.get(gauge).copied()
    }

    pub fn is_gauge(&self, address: &Address) -> bool {
        self.state.read().vault_for_gauge.contains_key(address)
    }

    pub fn is_registered(&self, vault: &Address) -> bool {
        self.state.read().gauges.contains_key(vault)
    }

    /// Registered vaults in registration order.
    pub fn vaults(&self) -> Vec<Address> {
        self.state.read().vaults.clone()
    }

    pub fn set_management(&self, caller: &Address, new: Address) -> Result<(), RewardError> {
        Ok(self.state.write().management.set_management(caller, new)?)
    }

    pub fn accept_management(&self, caller: &Address) -> Result<(), RewardError> {
        Ok(self.state.write().management.accept_management(caller)?)
    }
}

impl TargetRegistry for Registry {
    fn is_eligible(&self, target: &Address) -> bool {
        self.is_registered(target)
    }
}
