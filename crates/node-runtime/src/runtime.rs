//! # Node Runtime
//!
//! Process lifecycle around a [`NodeContainer`].
//!
//! ## Startup Sequence
//!
//! 1. Dial `seeds ++ peers` concurrently
//! 2. Sync with one random connected peer that serves the gossip protocol
//!
//! ## Shutdown Sequence
//!
//! 1. Stop the relay
//! 2. Save the connected peers' addresses, close the network
//! 3. Close the node store

use std::sync::Arc;

use anyhow::{Context, Result};
use df_03_gossip::{PeerAddressStore, PeerNetwork};
use futures::future::join_all;
use shared_types::PeerId;
use tracing::{error, info, warn};

use crate::container::NodeContainer;

pub struct NodeRuntime {
    container: Arc<NodeContainer>,
    peer_store: Arc<dyn PeerAddressStore>,
}

impl NodeRuntime {
    pub fn new(container: Arc<NodeContainer>, peer_store: Arc<dyn PeerAddressStore>) -> Self {
        Self {
            container,
            peer_store,
        }
    }

    pub fn container(&self) -> Arc<NodeContainer> {
        Arc::clone(&self.container)
    }

    /// Bootstrap onto the network, then sync. Returns the peer synced with.
    pub async fn start(&self) -> Option<PeerId> {
        let addresses = self.container.config.bootstrap_addresses();
        self.bootstrap(&addresses).await;
        let synced = self.container.communication.sync_with_random_peer().await;
        if synced.is_none() && !self.container.network.connected_peers().is_empty() {
            warn!("no connected peer could be synced with");
        }
        synced
    }

    /// Dial every address concurrently. Returns how many connected.
    pub async fn bootstrap(&self, addresses: &[String]) -> usize {
        if addresses.is_empty() {
            info!("no bootstrap peers configured");
            return 0;
        }

        let network = &self.container.network;
        let attempts = addresses.iter().map(|address| async move {
            match network.connect(address).await {
                Ok(peer) => {
                    info!(peer = %peer, "connected to bootstrap peer");
                    true
                }
                Err(e) => {
                    error!(address = %address, error = %e, "connecting to bootstrap peer failed");
                    false
                }
            }
        });
        let connected = join_all(attempts).await.into_iter().filter(|ok| *ok).count();
        if connected == 0 {
            error!("could not connect to any configured peers");
        }
        connected
    }

    /// Save peers, close the network and the store.
    pub async fn shutdown(&self) -> Result<()> {
        info!("initiating graceful shutdown");
        self.container.stop_relay();
        self.container
            .communication
            .tear_down(self.peer_store.as_ref())
            .await;
        self.container
            .storage
            .tear_down()
            .context("failed to close node store")?;
        info!("shutdown complete");
        Ok(())
    }
}
