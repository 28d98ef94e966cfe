//! Addresses for principals and stored records.
//!
//! Every participant (human signer, organization, controller) and every
//! stored record is named by a 32-byte [`Address`]. Record addresses are
//! derived deterministically from `(purpose, seeds...)` so that the same
//! organization/principal pair always resolves to the same record.
//!
//! # Derivation
//!
//! `SHA-256(DOMAIN_TAG || len(purpose) || purpose || len(seed_0) || seed_0 || ...)`
//!
//! Lengths are little-endian `u32`, so `("ab", "c")` and `("a", "bc")` never
//! collide.
//!
//! Addresses serialize as hex strings in human-readable formats (TOML, JSON)
//! and as raw bytes in CBOR.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const DOMAIN_TAG: &[u8] = b"sigorg-address-v1";

/// Opaque 32-byte identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

/// A caller identity, already authenticated by the signing layer.
pub type Principal = Address;

impl Address {
    /// Create from a 32-byte array.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a record address from a purpose and seeds.
    pub fn derive(purpose: &str, seeds: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_TAG);
        hasher.update((purpose.len() as u32).to_le_bytes());
        hasher.update(purpose.as_bytes());
        for seed in seeds {
            hasher.update((seed.len() as u32).to_le_bytes());
            hasher.update(seed);
        }
        Self(hasher.finalize().into())
    }

    /// Stable address for a human-readable label (operator scripts, tests).
    pub fn from_name(name: &str) -> Self {
        Self::derive("name", &[name.as_bytes()])
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}…)", self.short())
    }
}

/// Parse errors for hex-encoded addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| AddressParseError::Hex(e.to_string()))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::Length(bytes.len()))?;
        Ok(Self(array))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

struct AddressVisitor;

impl<'de> Visitor<'de> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("32 bytes or a 64-character hex string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Address, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Address, E> {
        let array: [u8; 32] = v
            .try_into()
            .map_err(|_| E::invalid_length(v.len(), &self))?;
        Ok(Address(array))
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Address, A::Error> {
        let mut array = [0u8; 32];
        for (i, byte) in array.iter_mut().enumerate() {
            *byte = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(Address(array))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(AddressVisitor)
        } else {
            deserializer.deserialize_bytes(AddressVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_is_deterministic() {
        let org = Address::from_name("acme");
        let a = Address::derive("member-account", &[org.as_bytes(), b"alice"]);
        let b = Address::derive("member-account", &[org.as_bytes(), b"alice"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_purpose_separates_addresses() {
        let org = Address::from_name("acme");
        let mint = Address::derive("mint", &[org.as_bytes()]);
        let controller = Address::derive("freeze-controller", &[org.as_bytes()]);
        assert_ne!(mint, controller);
    }

    #[test]
    fn test_seed_boundaries_do_not_collide() {
        let a = Address::derive("p", &[b"ab", b"c"]);
        let b = Address::derive("p", &[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_and_parse() {
        let addr = Address::from_name("bob");
        let text = addr.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_parse_rejects_short_input() {
        let err = "abcd".parse::<Address>().unwrap_err();
        assert_eq!(err, AddressParseError::Length(2));
    }

    #[test]
    fn test_json_uses_hex() {
        let addr = Address::from_name("carol");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        assert_eq!(serde_json::from_str::<Address>(&json).unwrap(), addr);
    }

    #[test]
    fn test_address_keyed_map_in_cbor() {
        let mut weights = std::collections::BTreeMap::new();
        weights.insert(Address::from_name("alice"), 3u64);
        weights.insert(Address::from_name("bob"), 1u64);
        let bytes = crate::serialization::to_cbor(&weights).unwrap();
        let back: std::collections::BTreeMap<Address, u64> =
            crate::serialization::from_cbor(&bytes).unwrap();
        assert_eq!(back, weights);
    }

    proptest! {
        #[test]
        fn distinct_names_give_distinct_addresses(a in "[a-z]{1,16}", b in "[a-z]{1,16}") {
            prop_assume!(a != b);
            prop_assert_ne!(Address::from_name(&a), Address::from_name(&b));
        }
    }
}
