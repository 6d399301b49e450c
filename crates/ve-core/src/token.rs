//! In-memory fungible token.
//!
//! Stands in for the locked token, reward tokens and vault shares in tests and
//! the simulator. Balances live behind one mutex so every call, including
//! [`transfer_many`](FungibleToken::transfer_many), is atomic.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::TokenError;
use crate::traits::FungibleToken;
use crate::types::{Address, Amount};

#[derive(Debug, Default)]
struct Balances {
    accounts: HashMap<Address, Amount>,
    supply: Amount,
}

impl Balances {
    fn get(&self, account: &Address) -> Amount {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    fn debit(&mut self, account: &Address, amount: Amount) -> Result<(), TokenError> {
        let have = self.get(account);
        let left = have
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance { account: *account, have, need: amount })?;
        self.accounts.insert(*account, left);
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: Amount) -> Result<(), TokenError> {
        let next = self.get(account).checked_add(amount).ok_or(TokenError::Overflow)?;
        self.accounts.insert(*account, next);
        Ok(())
    }
}

/// A named token with balances held in memory.
#[derive(Debug)]
pub struct MemoryToken {
    address: Address,
    symbol: String,
    inner: Mutex<Balances>,
}

impl MemoryToken {
    pub fn new(symbol: &str) -> Self {
        Self {
            address: Address::derive("ve/token", symbol.as_bytes()),
            symbol: symbol.to_string(),
            inner: Mutex::new(Balances::default()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl FungibleToken for MemoryToken {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.inner.lock().get(account)
    }

    fn total_supply(&self) -> Amount {
        self.inner.lock().supply
    }

    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        self.transfer_many(from, &[(*to, amount)])
    }

    fn transfer_many(&self, from: &Address, outputs: &[(Address, Amount)]) -> Result<(), TokenError> {
        let mut inner = self.inner.lock();
        let total = outputs
            .iter()
            .try_fold(0u128, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(TokenError::Overflow)?;
        let have = inner.get(from);
        if have < total {
            return Err(TokenError::InsufficientBalance { account: *from, have, need: total });
        }
        // Balances sum to `supply`, so the credits cannot overflow.
        inner.debit(from, total)?;
        for (to, amount) in outputs {
            inner.credit(to, *amount)?;
        }
        Ok(())
    }

    fn mint(&self, to: &Address, amount: Amount) -> Result<(), TokenError> {
        let mut inner = self.inner.lock();
        let supply = inner.supply.checked_add(amount).ok_or(TokenError::Overflow)?;
        inner.credit(to, amount)?;
        inner.supply = supply;
        Ok(())
    }

    fn burn(&self, from: &Address, amount: Amount) -> Result<(), TokenError> {
        let mut inner = self.inner.lock();
        inner.debit(from, amount)?;
        inner.supply -= amount;
        Ok(())
    }
}
