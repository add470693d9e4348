//! # Node Container
//!
//! Builds the node components in dependency order and holds them for the
//! lifetime of the process.
//!
//! ```text
//! NodeDatabase ──→ StorageModule ──┬──→ ForumService (local creation)
//!                                  │
//! TcpPeerNetwork ──────────────────┴──→ CommunicationManager ──→ InventoryRelay
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use df_01_content_model::ProofOfWorkEngine;
use df_02_node_storage::{NodeDatabase, StorageModule};
use df_03_gossip::{start_inventory_relay, CommunicationManager, PeerNetwork, MESSAGE_PROTOCOL};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapters::TcpPeerNetwork;
use crate::api::ForumService;
use crate::container::config::NodeConfig;

pub struct NodeContainer {
    pub config: NodeConfig,
    pub storage: Arc<StorageModule>,
    pub network: Arc<TcpPeerNetwork>,
    pub communication: Arc<CommunicationManager>,
    pub forum: ForumService,
    relay: Mutex<Option<JoinHandle<()>>>,
}

impl NodeContainer {
    /// Wire every component on top of `database` and start listening.
    pub async fn build(config: NodeConfig, database: Arc<dyn NodeDatabase>) -> Result<Self> {
        let storage = Arc::new(StorageModule::new(database));

        let network = TcpPeerNetwork::bind(config.peer_network())
            .await
            .with_context(|| format!("failed to listen on port {}", config.network.port))?;

        let communication = Arc::new(CommunicationManager::new(
            config.gossip(),
            Arc::clone(&storage),
            Arc::clone(&network) as Arc<dyn PeerNetwork>,
        ));
        network.register_handler(MESSAGE_PROTOCOL, &communication);
        let relay = start_inventory_relay(&communication);

        let engine = ProofOfWorkEngine::new(&config.proof_of_work());
        let forum = ForumService::new(Arc::clone(&storage), engine);
        info!(
            peer = %network.local_peer(),
            difficulty = forum.difficulty(),
            "node components ready"
        );

        Ok(Self {
            config,
            storage,
            network,
            communication,
            forum,
            relay: Mutex::new(Some(relay)),
        })
    }

    /// Stop re-announcing published nodes.
    pub fn stop_relay(&self) {
        if let Some(relay) = self.relay.lock().take() {
            relay.abort();
        }
    }
}

/// Open the persistent store under `database.storage_path`.
#[cfg(feature = "rocksdb")]
pub fn open_database(config: &NodeConfig) -> Result<Arc<dyn NodeDatabase>> {
    use df_02_node_storage::{RocksDbConfig, RocksDbNodeDatabase};

    let path = config.database.storage_path.clone();
    let database = RocksDbNodeDatabase::open(RocksDbConfig::at(path.clone()))
        .with_context(|| format!("failed to open node store at {path}"))?;
    info!(path = %path, "opened RocksDB node store");
    Ok(Arc::new(database))
}

/// Without the `rocksdb` feature nodes live in memory only.
#[cfg(not(feature = "rocksdb"))]
pub fn open_database(config: &NodeConfig) -> Result<Arc<dyn NodeDatabase>> {
    use df_02_node_storage::InMemoryNodeDatabase;

    tracing::warn!(
        path = %config.database.storage_path,
        "built without rocksdb, nodes will not survive a restart"
    );
    Ok(Arc::new(InMemoryNodeDatabase::new()))
}
