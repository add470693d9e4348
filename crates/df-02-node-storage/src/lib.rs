//! # Node Storage (df-02)
//!
//! Two-level lookup for nodes: a cache in front of a persistent store.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  node_exists ──→│ NodeCache                    │
//!  get_node    ──→│  hashes: known-to-exist      │── miss ──┐
//!                 │  nodes:  fully materialized  │          │
//!                 └──────────────────────────────┘          ↓
//!                                                 ┌──────────────────┐
//!  store_node  ─────────────────────────────────→ │ NodeDatabase     │
//!                                                 │  nodes:  fp → node bytes
//!                                                 │  edges:  parent ‖ child
//!                                                 │  times:  be64(ts) ‖ fp
//!                                                 └──────────────────┘
//! ```
//!
//! Every stored node has exactly one entry in each index. The three writes
//! are not transactional; a failure in one index is reported through
//! [`StoreReport`] rather than hidden.
//!
//! Newly available nodes are announced to [`NodeListener`]s through
//! [`StorageModule::publish_node`].

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::memory::InMemoryNodeDatabase;
#[cfg(feature = "rocksdb")]
pub use adapters::rocksdb::{RocksDbConfig, RocksDbNodeDatabase};
pub use domain::cache::NodeCache;
pub use domain::errors::{StorageError, StorageIndex, StoreReport};
pub use domain::keys;
pub use ports::outbound::{NodeDatabase, NodeListener};
pub use service::{StorageModule, DEFAULT_CHILDREN_LIMIT};
