//! Gossip domain: wire codec, inventory locks, configuration and counters.

pub mod config;
pub mod errors;
pub mod inventory;
pub mod protocol;
pub mod stats;
