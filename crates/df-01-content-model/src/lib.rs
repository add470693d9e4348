//! # Content Model & Proof-of-Work (df-01)
//!
//! Defines the unit of discussion content, the `Node`, and the two checks
//! that make a node acceptable to the network:
//!
//! ```text
//!  DataObject ──serialize──→ data bytes ──sha256──→ preimage
//!                               │                      │
//!                               │        ProofOfWorkEngine::compute
//!                               │                      ↓
//!                               └──── ++ ──────── pow header
//!                                      │
//!                                   sha224
//!                                      ↓
//!                                 fingerprint
//! ```
//!
//! A node is **verified** when both hold:
//!
//! 1. `fingerprint == sha224(data_bytes ++ pow_header)`
//! 2. the pow header satisfies its declared difficulty against `sha256(data_bytes)`
//!
//! ## Crate Structure
//!
//! - `domain/` - `DataObject`, `SecurityObject`, `Node`
//! - `pow/` - hashcash-style proof-of-work engine and header format
//! - `errors` - content, verification and proof-of-work errors

pub mod domain;
pub mod errors;
pub mod pow;

pub use domain::{create_fingerprint, DataObject, Node, SecurityObject, TOPIC_INDICATOR};
pub use errors::{ContentError, ProofOfWorkError, VerificationError};
pub use pow::{ProofOfWorkConfig, ProofOfWorkEngine, ProofOfWorkHeader};
pub use shared_types::{HashSignature, PeerId};
