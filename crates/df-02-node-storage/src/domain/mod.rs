//! Storage domain: key layout, cache and error types.

pub mod cache;
pub mod errors;
pub mod keys;
