//! # Shared Types Crate
//!
//! Identifier types and time helpers used across the dforum subsystems.
//!
//! ## Contents
//!
//! - **entities**: `HashSignature` (the 28-byte content fingerprint) and `PeerId`
//! - **time**: unix-second clock helpers and the sync catch-up window
//! - **errors**: conversion failures for the identifier types

pub mod entities;
pub mod errors;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use time::*;
