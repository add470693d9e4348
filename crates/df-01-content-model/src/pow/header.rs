//! Textual proof-of-work header.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

use crate::errors::ProofOfWorkError;

/// Version tag of the header format.
pub const POW_VERSION: &str = "DF1";

/// Number of colon-separated fields in a header.
const HEADER_FIELDS: usize = 4;

/// Length of a sha256 digest in hex characters; difficulty may not exceed it.
const SHA256_HEX_LEN: i64 = 64;

/// Parsed form of `version:difficulty:salt:counter`.
///
/// Salt and counter are kept in their encoded form: the header hash is taken
/// over the exact text, so re-encoding must never change it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofOfWorkHeader {
    pub version: String,
    pub difficulty: u32,
    pub salt: String,
    pub counter: String,
}

impl ProofOfWorkHeader {
    /// Build a header from a raw salt and a numeric counter.
    pub fn new(difficulty: u32, salt: &[u8], counter: u64) -> Self {
        Self {
            version: POW_VERSION.to_string(),
            difficulty,
            salt: STANDARD.encode(salt),
            counter: encode_counter(counter),
        }
    }

    /// Parse a header string.
    ///
    /// Fails with `InvalidHeader` on a wrong field count and with
    /// `InvalidDifficulty` when the difficulty is not a number, is negative,
    /// or exceeds the hash length in hex characters.
    pub fn parse(header: &str) -> Result<Self, ProofOfWorkError> {
        let fields: Vec<&str> = header.split(':').collect();
        if fields.len() != HEADER_FIELDS {
            return Err(ProofOfWorkError::InvalidHeader {
                fields: fields.len(),
            });
        }

        let difficulty: i64 = fields[1]
            .parse()
            .map_err(|_| ProofOfWorkError::InvalidDifficulty(fields[1].to_string()))?;
        if !(0..=SHA256_HEX_LEN).contains(&difficulty) {
            return Err(ProofOfWorkError::InvalidDifficulty(fields[1].to_string()));
        }

        Ok(Self {
            version: fields[0].to_string(),
            difficulty: difficulty as u32,
            salt: fields[2].to_string(),
            counter: fields[3].to_string(),
        })
    }

    /// Number of leading hex characters that must match.
    pub fn collision_size(&self) -> usize {
        (self.difficulty / 4) as usize
    }
}

impl fmt::Display for ProofOfWorkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.version, self.difficulty, self.salt, self.counter
        )
    }
}

/// Counter is base64 over its decimal text.
pub(crate) fn encode_counter(counter: u64) -> String {
    STANDARD.encode(counter.to_string())
}
