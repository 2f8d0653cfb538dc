//! Hashing primitives for the ledger
//!
//! This module provides:
//! - SHA-256 hashing of canonical bytes
//! - A 32-byte [`Digest`] rendered as lowercase hex
//! - The fixed chain layout: `SHA256(prev_hex || entry_hex)`
//!
//! The chain is computed over the hex *strings*, not the raw bytes, so that
//! any third party holding the hex digests can re-verify it bit-for-bit.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering (64 chars)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-char hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::Encoding(format!("Invalid digest {:?}: {}", s, e)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Digest(hasher.finalize().into())
}

/// Chain value binding an entry to its predecessor
///
/// `None` is the genesis link and contributes the empty string.
pub fn chain_digest(prev: Option<&Digest>, entry_hash: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev {
        hasher.update(prev.to_hex().as_bytes());
    }
    hasher.update(entry_hash.to_hex().as_bytes());
    Digest(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_known_vector() {
        // SHA-256("abc")
        let digest = hash_bytes(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let digest = hash_bytes(b"test data");
        let parsed = Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(parsed, digest);
        assert!(Digest::from_hex("not-hex").is_err());
        assert!(Digest::from_hex("abcd").is_err());
    }

    #[test]
    fn test_chain_digest_uses_hex_concatenation() {
        let prev = hash_bytes(b"prev");
        let entry = hash_bytes(b"entry");

        let expected = hash_bytes(format!("{}{}", prev.to_hex(), entry.to_hex()).as_bytes());
        assert_eq!(chain_digest(Some(&prev), &entry), expected);
    }

    #[test]
    fn test_genesis_link_is_empty_prefix() {
        let entry = hash_bytes(b"entry");
        let expected = hash_bytes(entry.to_hex().as_bytes());
        assert_eq!(chain_digest(None, &entry), expected);
    }

    #[test]
    fn test_digest_serde_as_hex_string() {
        let digest = hash_bytes(b"abc");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
