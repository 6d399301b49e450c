//! Core protocol types: account addresses, curve checkpoints, lock records.
//!
//! All token quantities are `u128` base units. Times are unix seconds.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Token quantity in base units.
pub type Amount = u128;
/// Unix timestamp in seconds.
pub type Timestamp = u64;
/// Monotonic block height supplied by the clock.
pub type BlockNumber = u64;

/// A 20-byte account or instance address.
///
/// Accounts, tokens, the ledger, gauges and pools all share one address space.
/// Rendered as `0x`-prefixed lowercase hex; serde uses the same string form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid owner or management target.
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Derive a deterministic address from a domain tag and a seed.
    ///
    /// The first 20 bytes of `BLAKE3(domain || seed)`. Used for gauge
    /// addresses (seeded with the vault address) and for named accounts.
    pub fn derive(domain: &str, seed: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain.as_bytes());
        hasher.update(seed);
        let digest = hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest.as_bytes()[..20]);
        Self(out)
    }

    /// Stable address for a human-readable name (`"alice"`, `"treasury"`).
    pub fn from_name(name: &str) -> Self {
        Self::derive("ve/account", name.as_bytes())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Failure to parse an [`Address`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: {0} bytes, expected 20")] InvalidLength(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let arr: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A checkpoint on a piecewise-linear voting-power curve.
///
/// `bias` and `slope` are scaled by the ledger's maximum lock time: a lock of
/// `amount` has `slope == amount` and `bias == amount * (end - ts)`. Reported
/// power is `bias / max_lock_time`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Point {
    pub bias: i128,
    pub slope: i128,
    pub ts: Timestamp,
    pub blk: BlockNumber,
}

/// An account's lock: quantity and week-aligned unlock time (0 = no lock).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LockedBalance {
    pub amount: Amount,
    pub end: Timestamp,
}

impl LockedBalance {
    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    /// True while tokens are locked and the unlock time is still ahead.
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.amount > 0 && self.end > now
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.amount > 0 && self.end <= now
    }
}

/// What an operator may do on an account owner's behalf in a gauge.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub can_deposit_for: bool,
    pub can_claim_for: bool,
    pub can_lock_for: bool,
}

impl Capabilities {
    pub const NONE: Self = Self { can_deposit_for: false, can_claim_for: false, can_lock_for: false };
    pub const ALL: Self = Self { can_deposit_for: true, can_claim_for: true, can_lock_for: true };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Address ---

    #[test]
    fn address_display_roundtrips_through_from_str() {
        let a = Address::from_name("alice");
        let s = a.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 42);
        assert_eq!(s.parse::<Address>().unwrap(), a);
    }

    #[test]
    fn address_parse_accepts_unprefixed_hex() {
        let a: Address = "0101010101010101010101010101010101010101".parse().unwrap();
        assert_eq!(a, Address([1u8; 20]));
    }

    #[test]
    fn address_parse_rejects_bad_input() {
        assert!(matches!("0xzz".parse::<Address>(), Err(AddressParseError::InvalidHex(_))));
        assert_eq!("0x0102".parse::<Address>(), Err(AddressParseError::InvalidLength(2)));
    }

    #[test]
    fn derive_is_domain_separated() {
        let seed = [7u8; 20];
        assert_ne!(Address::derive("ve/gauge", &seed), Address::derive("ve/pool", &seed));
        assert_eq!(Address::derive("ve/gauge", &seed), Address::derive("ve/gauge", &seed));
    }

    #[test]
    fn names_map_to_distinct_nonzero_addresses() {
        let a = Address::from_name("alice");
        let b = Address::from_name("bob");
        assert_ne!(a, b);
        assert!(!a.is_zero());
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn address_serde_uses_hex_string() {
        let a = Address::from_name("carol");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{a}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    // --- LockedBalance ---

    #[test]
    fn lock_lifecycle_predicates() {
        let empty = LockedBalance::default();
        assert!(empty.is_empty());
        assert!(!empty.is_active(0));

        let lock = LockedBalance { amount: 5, end: 100 };
        assert!(lock.is_active(99));
        assert!(!lock.is_expired(99));
        assert!(lock.is_expired(100));
        assert!(!lock.is_active(100));
    }

    #[test]
    fn capabilities_presets() {
        assert!(Capabilities::default().is_none());
        assert!(!Capabilities::ALL.is_none());
    }
}
