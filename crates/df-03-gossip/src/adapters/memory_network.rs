//! # In-Memory Peer Network
//!
//! A [`PeerNetwork`] whose streams are tokio duplex pipes. Every simulated
//! peer registers its stream handler with a shared [`MemoryHub`]; opening a
//! stream spawns the remote handler on the other end of a fresh pipe.
//!
//! Connections are one-directional: `a.connect(b)` lets `a` open streams to
//! `b`. Handlers are held weakly so that peers can be dropped independently.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::PeerId;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::domain::config::MESSAGE_PROTOCOL;
use crate::domain::errors::GossipError;
use crate::ports::inbound::StreamHandler;
use crate::ports::outbound::{BoxedStream, PeerNetwork};

/// Duplex buffer per stream.
const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Default)]
pub struct MemoryHub {
    handlers: RwLock<HashMap<PeerId, Weak<dyn StreamHandler>>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Route streams for `peer` to `handler`.
    pub fn register<H: StreamHandler + 'static>(&self, peer: PeerId, handler: &Arc<H>) {
        let weak: Weak<H> = Arc::downgrade(handler);
        let weak: Weak<dyn StreamHandler> = weak;
        self.handlers.write().insert(peer, weak);
    }

    pub fn unregister(&self, peer: &PeerId) {
        self.handlers.write().remove(peer);
    }

    fn handler(&self, peer: &PeerId) -> Option<Arc<dyn StreamHandler>> {
        self.handlers.read().get(peer).and_then(Weak::upgrade)
    }
}

pub struct MemoryNetwork {
    local: PeerId,
    hub: Arc<MemoryHub>,
    connections: RwLock<BTreeSet<PeerId>>,
    closed: AtomicBool,
}

impl MemoryNetwork {
    pub fn new(local: PeerId, hub: Arc<MemoryHub>) -> Self {
        Self {
            local,
            hub,
            connections: RwLock::new(BTreeSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn connect(&self, peer: PeerId) {
        self.connections.write().insert(peer);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerNetwork for MemoryNetwork {
    fn local_peer(&self) -> PeerId {
        self.local.clone()
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        self.connections.read().iter().cloned().collect()
    }

    async fn open_stream(&self, peer: &PeerId, protocol: &str) -> Result<BoxedStream, GossipError> {
        if self.is_closed() || !self.connections.read().contains(peer) {
            return Err(GossipError::UnknownPeer(peer.to_string()));
        }
        if protocol != MESSAGE_PROTOCOL {
            return Err(GossipError::StreamUnavailable {
                peer: peer.to_string(),
                message: format!("protocol {protocol} not supported"),
            });
        }
        let handler = self
            .hub
            .handler(peer)
            .ok_or_else(|| GossipError::StreamUnavailable {
                peer: peer.to_string(),
                message: "peer is gone".to_string(),
            })?;

        let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
        let from = self.local.clone();
        tokio::spawn(async move {
            handler.handle_stream(from, Box::new(remote)).await;
        });
        Ok(Box::new(local))
    }

    fn supports_protocol(&self, peer: &PeerId, protocol: &str) -> bool {
        protocol == MESSAGE_PROTOCOL && self.hub.handler(peer).is_some()
    }

    fn peer_addresses(&self) -> Vec<String> {
        self.connections
            .read()
            .iter()
            .map(|peer| format!("/memory/{peer}"))
            .collect()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.connections.write().clear();
        self.hub.unregister(&self.local);
    }
}
