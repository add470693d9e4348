//! # Content Errors
//!
//! Error taxonomy for node construction, parsing and verification.

use thiserror::Error;

/// Proof-of-work failures, each with a distinct reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofOfWorkError {
    /// The iteration ceiling was reached without a matching header.
    #[error("exceeded {iterations} iterations without finding a solution")]
    SolutionNotFound { iterations: u64 },

    /// Empty content or a preimage that is not a sha256 hex digest.
    #[error("invalid data object provided")]
    InvalidInput,

    /// The header does not have exactly four colon-separated fields.
    #[error("invalid proof-of-work header format: {fields} fields")]
    InvalidHeader { fields: usize },

    /// Difficulty is not a number, negative, or longer than the hash.
    #[error("difficulty too low or out of bounds: {0}")]
    InvalidDifficulty(String),

    /// Leading characters of the header hash do not match the content hash.
    #[error("no collision: leading {chars} hex characters do not match")]
    NoCollision { chars: usize },

    /// Declared difficulty is below the verifier's local floor.
    #[error("declared difficulty {declared} below local minimum {minimum}")]
    BelowMinimumDifficulty { declared: u32, minimum: u32 },

    /// Salt could not be drawn from the OS random source.
    #[error("random source failure: {0}")]
    Random(String),
}

/// Why a node failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Recomputed fingerprint differs from the one carried by the node.
    #[error("fingerprint mismatch")]
    FingerprintMismatch,

    /// Fingerprint matched but the proof-of-work header did not hold.
    #[error("proof of work rejected: {0}")]
    ProofOfWork(#[from] ProofOfWorkError),

    /// Data object could not be serialized for re-hashing.
    #[error("data object serialization failed: {0}")]
    Serialization(String),
}

/// Failures building, encoding or decoding a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("malformed node bytes: {0}")]
    Malformed(String),

    #[error("proof of work failed: {0}")]
    ProofOfWork(#[from] ProofOfWorkError),
}
