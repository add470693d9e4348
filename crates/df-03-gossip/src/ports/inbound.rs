//! # Inbound Ports
//!
//! Implemented by `CommunicationManager`; called by the transport for every
//! stream a remote peer opens under the gossip protocol.

use async_trait::async_trait;
use shared_types::PeerId;

use super::outbound::BoxedStream;

#[async_trait]
pub trait StreamHandler: Send + Sync {
    /// Handle one inbound stream to completion. The stream is closed on return.
    async fn handle_stream(&self, remote: PeerId, stream: BoxedStream);
}
