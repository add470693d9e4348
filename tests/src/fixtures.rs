//! # Test Fixtures
//!
//! Simulated peers on a shared [`MemoryHub`] and cheap node builders.
//! Proof-of-work runs at difficulty 16 so stamping stays fast.

use std::sync::Arc;

use df_01_content_model::{DataObject, Node, ProofOfWorkConfig, ProofOfWorkEngine};
use df_02_node_storage::{InMemoryNodeDatabase, StorageModule};
use df_03_gossip::{
    BoxedStream, CommunicationManager, GossipConfig, MemoryHub, MemoryNetwork, StreamHandler,
};
use shared_types::{HashSignature, PeerId, UnixTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub struct TestPeer {
    pub id: PeerId,
    pub network: Arc<MemoryNetwork>,
    pub database: Arc<InMemoryNodeDatabase>,
    pub storage: Arc<StorageModule>,
    pub manager: Arc<CommunicationManager>,
}

impl TestPeer {
    /// A peer registered on `hub` under `name`.
    pub fn spawn(hub: &Arc<MemoryHub>, name: &str, config: GossipConfig) -> Self {
        let id = PeerId::from(name);
        let network = Arc::new(MemoryNetwork::new(id.clone(), Arc::clone(hub)));
        let database = Arc::new(InMemoryNodeDatabase::new());
        let storage = Arc::new(StorageModule::new(database.clone()));
        let manager = Arc::new(CommunicationManager::new(
            config,
            Arc::clone(&storage),
            network.clone(),
        ));
        hub.register(id.clone(), &manager);
        Self {
            id,
            network,
            database,
            storage,
            manager,
        }
    }

    /// Let each peer open streams to the other.
    pub fn link(&self, other: &TestPeer) {
        self.network.connect(other.id.clone());
        other.network.connect(self.id.clone());
    }

    /// Send `frame` as if from `from` and collect the reply.
    pub async fn exchange(&self, from: &str, frame: &[u8]) -> Vec<u8> {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        client.write_all(frame).await.unwrap();
        client.shutdown().await.unwrap();
        self.manager
            .handle_stream(PeerId::from(from), Box::new(server))
            .await;
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        reply
    }
}

/// Accepts streams and never answers.
pub struct HangingPeer;

#[async_trait::async_trait]
impl StreamHandler for HangingPeer {
    async fn handle_stream(&self, _remote: PeerId, mut stream: BoxedStream) {
        let mut sink = [0u8; 64];
        while let Ok(n) = stream.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
        std::future::pending::<()>().await;
    }
}

pub fn engine() -> ProofOfWorkEngine {
    ProofOfWorkEngine::new(&ProofOfWorkConfig::with_difficulty(16))
}

pub fn node(topic: &str, parent: HashSignature) -> Arc<Node> {
    Arc::new(
        Node::create(topic, "body", 0, parent, &engine()).expect("proof of work at difficulty 16"),
    )
}

pub fn node_at(topic: &str, parent: HashSignature, timestamp: UnixTime) -> Arc<Node> {
    let data = DataObject::with_timestamp(topic, "body", 0, parent, timestamp);
    Arc::new(Node::stamp(data, &engine()).expect("proof of work at difficulty 16"))
}
