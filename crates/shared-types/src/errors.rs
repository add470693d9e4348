//! # Identifier Errors

use thiserror::Error;

/// Failure to build an identifier from raw input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Raw bytes did not have the fixed signature length.
    #[error("invalid hash signature length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Text was not valid hex.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),
}
