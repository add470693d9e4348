//! # Outbound Ports
//!
//! The transport this crate drives. Connection establishment, discovery,
//! NAT traversal and encryption live behind [`PeerNetwork`].
//!
//! Production: `TcpPeerNetwork` (node-runtime)
//! Testing: `MemoryNetwork`

use async_trait::async_trait;
use shared_types::PeerId;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::errors::GossipError;

/// A bidirectional byte stream to one peer.
pub trait PeerStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> PeerStream for T {}

pub type BoxedStream = Box<dyn PeerStream>;

#[async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Identity of the local peer.
    fn local_peer(&self) -> PeerId;

    fn connected_peers(&self) -> Vec<PeerId>;

    /// Open a fresh stream to `peer` under `protocol`.
    async fn open_stream(&self, peer: &PeerId, protocol: &str) -> Result<BoxedStream, GossipError>;

    fn supports_protocol(&self, peer: &PeerId, protocol: &str) -> bool;

    /// Dialable addresses of the connected peers.
    fn peer_addresses(&self) -> Vec<String>;

    /// Drop every connection and stop accepting new ones.
    async fn close(&self);
}

/// Where the teardown peer snapshot is persisted.
pub trait PeerAddressStore: Send + Sync {
    fn save_peer_addresses(&self, addresses: Vec<String>) -> Result<(), GossipError>;
}
