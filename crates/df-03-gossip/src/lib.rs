//! # Gossip (df-03)
//!
//! Propagates nodes between peers.
//!
//! ```text
//!  local create ──→ storage.store_and_publish ──→ InventoryRelay ──→ broadcast Inv(F)
//!
//!  Inv(F) from P ──→ node_exists? ──no──→ inventory lock(F) ──→ DataRequest(F) to P
//!                                                                 │
//!                                        verify ←── node bytes ←──┘
//!                                           │
//!                                 store_and_publish (→ relay onwards)
//! ```
//!
//! ## Crate Structure
//!
//! - `domain/` - wire codec, inventory locks, config, counters, errors
//! - `ports/` - `PeerNetwork` (outbound transport) and `StreamHandler` (inbound)
//! - `service` - `CommunicationManager`, the protocol state machine
//! - `relay` - storage listener that re-announces published nodes
//! - `adapters/` - in-memory `PeerNetwork` over tokio duplex streams

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod relay;
pub mod service;

pub use adapters::memory_network::{MemoryHub, MemoryNetwork};
pub use domain::config::{GossipConfig, MESSAGE_PROTOCOL};
pub use domain::errors::{GossipError, ProtocolError};
pub use domain::inventory::{InventoryHandler, InventoryLock, LockOutcome};
pub use domain::protocol::{decode_frame, encode_frame, Frame, FrameHeader, ProtocolAction};
pub use domain::stats::GossipStatsSnapshot;
pub use ports::inbound::StreamHandler;
pub use ports::outbound::{BoxedStream, PeerAddressStore, PeerNetwork, PeerStream};
pub use relay::{start_inventory_relay, InventoryRelay};
pub use service::CommunicationManager;
