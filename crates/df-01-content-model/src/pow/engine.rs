//! Proof-of-work search and verification.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::config::ProofOfWorkConfig;
use super::header::{encode_counter, ProofOfWorkHeader};
use crate::errors::ProofOfWorkError;

/// Iteration ceiling for a single search (2^30).
pub const MAX_ITERATIONS: u64 = 1 << 30;

/// Random salt length in bytes.
const SALT_BYTES: usize = 8;

/// Length of a sha256 hex digest.
const SHA256_HEX_LEN: usize = 64;

/// Hex-encoded sha256 of arbitrary bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Preimage a header must collide with: `sha256(data_bytes)` in hex.
pub fn content_preimage(data: &[u8]) -> String {
    sha256_hex(data)
}

/// True when the first `n` characters of `hash` equal those of `preimage`.
pub fn acceptable_header(hash: &str, preimage: &str, n: usize) -> bool {
    match (hash.as_bytes().get(..n), preimage.as_bytes().get(..n)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Producer side of the proof-of-work scheme.
///
/// Computation is CPU-bound and may run for seconds at the standard
/// difficulty; async callers must move it onto a blocking worker.
#[derive(Clone, Debug)]
pub struct ProofOfWorkEngine {
    difficulty: u32,
    max_iterations: u64,
}

impl ProofOfWorkEngine {
    pub fn new(config: &ProofOfWorkConfig) -> Self {
        Self {
            difficulty: config.effective_difficulty(),
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Lower the iteration ceiling. Used to exercise the failure path.
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Stamp serialized content: hash it and search for a header.
    pub fn stamp(&self, data: &[u8]) -> Result<String, ProofOfWorkError> {
        if data.is_empty() {
            return Err(ProofOfWorkError::InvalidInput);
        }
        self.compute(&content_preimage(data))
    }

    /// Search for a header colliding with `preimage` using a fresh random salt.
    pub fn compute(&self, preimage: &str) -> Result<String, ProofOfWorkError> {
        let mut salt = [0u8; SALT_BYTES];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| ProofOfWorkError::Random(e.to_string()))?;
        self.compute_with_salt(preimage, &salt)
    }

    /// Deterministic search for a given salt; counter starts at 1.
    pub fn compute_with_salt(
        &self,
        preimage: &str,
        salt: &[u8],
    ) -> Result<String, ProofOfWorkError> {
        if preimage.len() != SHA256_HEX_LEN {
            return Err(ProofOfWorkError::InvalidInput);
        }

        let mut header = ProofOfWorkHeader::new(self.difficulty, salt, 1);
        let collision_size = header.collision_size();
        let mut counter: u64 = 1;
        let mut text = header.to_string();

        while !acceptable_header(&sha256_hex(text.as_bytes()), preimage, collision_size) {
            counter += 1;
            if counter >= self.max_iterations {
                return Err(ProofOfWorkError::SolutionNotFound {
                    iterations: self.max_iterations,
                });
            }
            header.counter = encode_counter(counter);
            text = header.to_string();
        }

        Ok(text)
    }
}

/// Verify a header against the content it claims to stamp.
///
/// Uses the difficulty declared in the header, not local configuration.
pub fn verify(header: &str, data: &[u8]) -> Result<(), ProofOfWorkError> {
    verify_with_minimum(header, data, 0)
}

/// Verify a header, additionally rejecting declared difficulties below `minimum`.
pub fn verify_with_minimum(
    header: &str,
    data: &[u8],
    minimum: u32,
) -> Result<(), ProofOfWorkError> {
    let parsed = ProofOfWorkHeader::parse(header)?;
    if parsed.difficulty < minimum {
        return Err(ProofOfWorkError::BelowMinimumDifficulty {
            declared: parsed.difficulty,
            minimum,
        });
    }

    let collision_size = parsed.collision_size();
    if !acceptable_header(
        &sha256_hex(header.as_bytes()),
        &content_preimage(data),
        collision_size,
    ) {
        return Err(ProofOfWorkError::NoCollision {
            chars: collision_size,
        });
    }
    Ok(())
}
