//! # Adapters
//!
//! Port implementations owned by the runtime.
//!
//! - `tcp_network` - `PeerNetwork` over plain TCP

pub mod tcp_network;

pub use tcp_network::{TcpNetworkConfig, TcpPeerNetwork, HANDSHAKE_PROTOCOL};
