//! Two-step admin transfer shared by every admin-gated component.
//!
//! `set_management(new)` only stages `pending`; the staged address must call
//! `accept_management()` itself before it gains control.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AccessError;
use crate::types::Address;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Management {
    current: Address,
    pending: Option<Address>,
}

impl Management {
    pub fn new(current: Address) -> Result<Self, AccessError> {
        if current.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        Ok(Self { current, pending: None })
    }

    pub fn current(&self) -> Address {
        self.current
    }

    pub fn pending(&self) -> Option<Address> {
        self.pending
    }

    /// Fail unless `caller` is the current management.
    pub fn ensure(&self, caller: &Address) -> Result<(), AccessError> {
        if *caller != self.current {
            return Err(AccessError::NotManagement(*caller));
        }
        Ok(())
    }

    /// Stage `new` as pending management. Replaces any earlier staged address.
    pub fn set_management(&mut self, caller: &Address, new: Address) -> Result<(), AccessError> {
        self.ensure(caller)?;
        if new.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        self.pending = Some(new);
        info!(current = %self.current, pending = %new, "management transfer staged");
        Ok(())
    }

    /// Complete a staged transfer. Only the pending address may call this.
    pub fn accept_management(&mut self, caller: &Address) -> Result<(), AccessError> {
        match self.pending {
            Some(pending) if pending == *caller => {
                self.current = pending;
                self.pending = None;
                info!(management = %pending, "management transfer accepted");
                Ok(())
            }
            _ => Err(AccessError::NotPendingManagement(*caller)),
        }
    }
}
