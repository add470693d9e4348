//! Key layout of the three persistent indexes.
//!
//! | Index     | Key                                   | Value       |
//! |-----------|---------------------------------------|-------------|
//! | nodes     | fingerprint (28)                      | node bytes  |
//! | edges     | parent (28) ‖ child (28)              | empty       |
//! | timestamps| unix seconds, sign-flipped BE (8) ‖ fp  | empty       |
//!
//! The time is stored big-endian with its sign bit flipped, which keeps
//! lexicographic key order equal to chronological order for pre-epoch
//! timestamps too. A range scan over the timestamp index walks nodes by age.

use shared_types::{HashSignature, UnixTime, HASH_SIGNATURE_LEN};

pub const EDGE_KEY_LEN: usize = 2 * HASH_SIGNATURE_LEN;
pub const TIMESTAMP_KEY_LEN: usize = 8 + HASH_SIGNATURE_LEN;

pub fn node_key(fingerprint: &HashSignature) -> [u8; HASH_SIGNATURE_LEN] {
    fingerprint.0
}

pub fn edge_key(parent: &HashSignature, child: &HashSignature) -> [u8; EDGE_KEY_LEN] {
    let mut key = [0u8; EDGE_KEY_LEN];
    key[..HASH_SIGNATURE_LEN].copy_from_slice(parent.as_bytes());
    key[HASH_SIGNATURE_LEN..].copy_from_slice(child.as_bytes());
    key
}

/// Child half of an edge key. `None` if the key has the wrong length.
pub fn edge_child(key: &[u8]) -> Option<HashSignature> {
    if key.len() != EDGE_KEY_LEN {
        return None;
    }
    HashSignature::from_slice(&key[HASH_SIGNATURE_LEN..]).ok()
}

const SIGN_BIT: u64 = 1 << 63;

/// Time prefix of a timestamp key. Orders like the signed timestamp.
pub fn time_prefix(timestamp: UnixTime) -> [u8; 8] {
    ((timestamp as u64) ^ SIGN_BIT).to_be_bytes()
}

pub fn timestamp_key(timestamp: UnixTime, fingerprint: &HashSignature) -> [u8; TIMESTAMP_KEY_LEN] {
    let mut key = [0u8; TIMESTAMP_KEY_LEN];
    key[..8].copy_from_slice(&time_prefix(timestamp));
    key[8..].copy_from_slice(fingerprint.as_bytes());
    key
}

/// Split a timestamp key into its time and fingerprint.
pub fn parse_timestamp_key(key: &[u8]) -> Option<(UnixTime, HashSignature)> {
    if key.len() != TIMESTAMP_KEY_LEN {
        return None;
    }
    let mut time = [0u8; 8];
    time.copy_from_slice(&key[..8]);
    let fingerprint = HashSignature::from_slice(&key[8..]).ok()?;
    Some(((u64::from_be_bytes(time) ^ SIGN_BIT) as UnixTime, fingerprint))
}
