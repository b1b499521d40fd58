//! Account and contract addresses
//!
//! Addresses are 20-byte values shown to the user as plain hex without a
//! chain-prefix marker. Parsing accepts an optional `0x` prefix and any
//! letter case; display is lowercase, with an EIP-55 checksummed form
//! available where mixed-case output is wanted.

use std::fmt;
use std::str::FromStr;

use primitive_types::H160;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WalletError;
use crate::hash::keccak256;

/// A 20-byte chain address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(H160);

impl Address {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(H160(bytes))
    }

    /// Parse a 20-byte hex string, with or without a leading `0x`.
    pub fn parse(input: &str) -> Option<Self> {
        let hex_str = input.strip_prefix("0x").unwrap_or(input);
        if hex_str.len() != Self::LEN * 2 {
            return None;
        }
        let raw = hex::decode(hex_str).ok()?;
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&raw);
        Some(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// EIP-55 mixed-case checksum rendering (no `0x`).
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.as_bytes());
        let digest = keccak256(lower.as_bytes());
        lower
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let nibble = (digest[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
                if nibble >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| WalletError::UnresolvedAddress {
            input: s.to_string(),
        })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).ok_or_else(|| de::Error::custom(format!("invalid address: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_and_without_prefix() {
        let a = Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let b = Address::parse("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn display_has_no_prefix() {
        let a = Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(a.to_string(), "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
    }

    #[test]
    fn rejects_wrong_lengths_and_non_hex() {
        assert!(Address::parse("0x1234").is_none());
        assert!(Address::parse("").is_none());
        assert!(Address::parse(&"zz".repeat(20)).is_none());
    }

    #[test]
    fn eip55_checksum_vector() {
        // Reference vector from the checksum specification
        let a = Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(a.to_checksum(), "5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn serde_round_trip() {
        let a = Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"5aaeb6053f3e94c9b9a09f33669435e7ef1beaed\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
