//! # Core Identifiers
//!
//! - **HashSignature**: 224-bit content fingerprint, the universal key type
//! - **PeerId**: opaque identifier of a remote peer, supplied by the network

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::IdentifierError;

/// Length of a fingerprint in bytes (SHA-224).
pub const HASH_SIGNATURE_LEN: usize = 28;

/// A 28-byte content fingerprint.
///
/// Used as the node key in every storage index, as the payload of inventory
/// and data-request frames, and as the key of the inventory lock table.
/// Equality is byte-exact. The all-zero value is the synthetic root that
/// top-level nodes name as their parent.
///
/// Serializes as a plain array of 28 numbers, which is also the element type
/// of sync responses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashSignature(pub [u8; HASH_SIGNATURE_LEN]);

impl HashSignature {
    /// The synthetic root. Children of this value are top-level nodes.
    pub const ZERO: HashSignature = HashSignature([0u8; HASH_SIGNATURE_LEN]);

    pub const fn new(bytes: [u8; HASH_SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a slice that must be exactly 28 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let array: [u8; HASH_SIGNATURE_LEN] =
            bytes
                .try_into()
                .map_err(|_| IdentifierError::InvalidLength {
                    expected: HASH_SIGNATURE_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    /// Parse from a 56-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, IdentifierError> {
        let bytes = hex::decode(s).map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIGNATURE_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First four bytes in hex, the form used in log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIGNATURE_LEN]
    }
}

impl AsRef<[u8]> for HashSignature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_SIGNATURE_LEN]> for HashSignature {
    fn from(bytes: [u8; HASH_SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for HashSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

impl fmt::Debug for HashSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashSignature({})", self.to_hex())
    }
}

/// Identifier of a remote peer as reported by the peer network.
///
/// The core never interprets it beyond equality and display; the transport
/// decides its shape (a multiaddr-style id, an `ip:port`, a test label).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
