//! # Proof-of-Work Engine
//!
//! Hashcash-style admission control: cheap to verify, expensive to forge.
//!
//! ## Header Format
//!
//! ```text
//! <version>:<difficulty>:<base64 salt>:<base64 counter>
//! DF1:24:QmFzZTY0==:MTI=
//! ```
//!
//! A header is acceptable when the first `difficulty / 4` hex characters of
//! `sha256(header)` equal the first `difficulty / 4` hex characters of the
//! content preimage `sha256(data_bytes)`.
//!
//! ## Difficulty
//!
//! The producer's configured difficulty is clamped to [16, 28]; anything
//! outside falls back to 24. The verifier trusts the difficulty declared in
//! the header, optionally enforcing a local floor
//! ([`verify_with_minimum`]).

mod config;
mod engine;
mod header;

pub use config::{
    ProofOfWorkConfig, MAX_CONFIGURABLE_DIFFICULTY, MIN_CONFIGURABLE_DIFFICULTY,
    STANDARD_DIFFICULTY,
};
pub use engine::{
    acceptable_header, content_preimage, sha256_hex, verify, verify_with_minimum,
    ProofOfWorkEngine, MAX_ITERATIONS,
};
pub use header::{ProofOfWorkHeader, POW_VERSION};
