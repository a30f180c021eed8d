//! Core type definitions for Knot
//!
//! Identifiers are fixed-width byte arrays so that hashing and signing
//! operate over the exact same byte sequence on every participant.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Round number. The first round is 1.
pub type Round = u64;

/// Creator-supplied wall-clock time in milliseconds since the Unix epoch.
pub type Timestamp = u64;

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(s)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CoreError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        })
}

/// EventId - content hash of an event
///
/// EventId = BLAKE3-derive("knot.event.id", signing_bytes || signature)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EventId {
    hash: [u8; 32],
}

impl EventId {
    /// Create an EventId from raw bytes
    pub fn new(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self {
            hash: decode_fixed(s)?,
        })
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// CreatorId - stable identity of a participant
///
/// The id is the creator's 32-byte Ed25519 public key, so a verifier can
/// recover the key from the id alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatorId {
    key: [u8; 32],
}

impl CreatorId {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the creator id from a public key
    pub fn from_public_key(public_key: [u8; 32]) -> Self {
        Self { key: public_key }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self {
            key: decode_fixed(s)?,
        })
    }

    /// Deterministic coin used by coin rounds.
    ///
    /// Bit 1 of the id read as a big-endian integer, i.e. the second lowest
    /// bit of the last byte.
    pub fn coin_bit(&self) -> bool {
        (self.key[31] >> 1) & 1 == 1
    }
}

impl fmt::Debug for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreatorId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

/// Fixed-size 64-byte signature
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    bytes: [u8; 64],
}

impl Signature {
    pub const LENGTH: usize = 64;

    /// All-zero value, the identity for [`Signature::xor`]
    pub const ZERO: Self = Self { bytes: [0u8; 64] };

    pub fn new(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
            expected: Self::LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Bytewise XOR of two signatures
    pub fn xor(&self, other: &Signature) -> Signature {
        let mut bytes = self.bytes;
        for (b, o) in bytes.iter_mut().zip(other.bytes.iter()) {
            *b ^= o;
        }
        Signature { bytes }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &self.to_hex()[..16])
    }
}

// serde only derives array impls up to 32 elements
impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.bytes)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Signature::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}
