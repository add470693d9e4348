//! Backends for the [`NodeDatabase`](crate::ports::outbound::NodeDatabase) port.

pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;
