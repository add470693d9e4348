//! # dforum Test Suite
//!
//! Cross-crate scenarios over the in-memory network and store.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Simulated peers and node builders
//! └── integration/
//!     ├── gossip_flows.rs   # Sync, inventory, relay, hanging peers
//!     └── storage_flows.rs  # Pagination, idempotence, sync ranges
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p df-tests
//! cargo test -p df-tests integration::gossip_flows
//! ```

pub mod fixtures;
pub mod integration;
