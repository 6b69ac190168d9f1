//! Core value types shared across the sweeper
//!
//! Addresses, key material, amounts and record identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sun per TRX (1 TRX = 1_000_000 sun)
pub const SUN_PER_TRX: u64 = 1_000_000;

/// Chain-native (base58check) TRON address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines: `TXYZab...wxyz`
    pub fn truncated(&self) -> String {
        let count = self.0.chars().count();
        if count <= 12 {
            return self.0.clone();
        }
        let head: String = self.0.chars().take(6).collect();
        let tail: String = self.0.chars().skip(count - 4).collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Private key material (hex)
///
/// Never printed. The raw value is only handed to chain adapters that sign.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(***)")
    }
}

impl fmt::Display for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Address together with the key that signs for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypair {
    pub address: Address,
    pub key: SigningKey,
}

impl Keypair {
    pub fn new(address: Address, key: SigningKey) -> Self {
        Self { address, key }
    }
}

/// Native currency amount in sun
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sun(pub u64);

impl Sun {
    pub const ZERO: Sun = Sun(0);

    pub fn from_trx(trx: u64) -> Self {
        Sun(trx.saturating_mul(SUN_PER_TRX))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Sun) -> Sun {
        Sun(self.0.saturating_add(other.0))
    }
}

/// Formats as a TRX decimal with six places: `50.000000`
impl fmt::Display for Sun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / SUN_PER_TRX, self.0 % SUN_PER_TRX)
    }
}

/// Sequential wallet row id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub u64);

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0.to_string())
    }
}

/// Sequential transaction record id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRecordId(pub u64);

impl fmt::Display for TransactionRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sun_display() {
        assert_eq!(Sun::from_trx(50).to_string(), "50.000000");
        assert_eq!(Sun(1).to_string(), "0.000001");
        assert_eq!(Sun(12_345_678).to_string(), "12.345678");
        assert_eq!(Sun::ZERO.to_string(), "0.000000");
    }

    #[test]
    fn test_signing_key_is_masked() {
        let key = SigningKey::new("deadbeef");
        assert_eq!(format!("{:?}", key), "SigningKey(***)");
        assert_eq!(key.to_string(), "***");
        assert_eq!(key.expose_secret(), "deadbeef");
    }

    #[test]
    fn test_address_truncation() {
        let addr = Address::new("TJRabPrwbZy45sbavfcjinPJC18kjpRTv8");
        assert_eq!(addr.truncated(), "TJRabP...RTv8");
        assert_eq!(Address::new("short").truncated(), "short");
    }

    #[test]
    fn test_address_truncation_multibyte() {
        // hand-edited store files are not guaranteed to hold base58
        let addr = Address::new("Tédéposit€wallet€é");
        assert_eq!(addr.truncated(), "Tédépo...et€é");
        assert_eq!(Address::new("€€€€€€€€€€€€").truncated(), "€€€€€€€€€€€€");
    }
}
