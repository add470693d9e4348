//! # Communication Manager
//!
//! The protocol state machine bound to one local peer and one storage module.
//!
//! ## Inbound
//!
//! ```text
//! AwaitHeader ──→ AwaitBody ──→ Dispatch ──→ Respond | Close
//!      └──── read_timeout covers both reads ────┘
//! ```
//!
//! A timeout or short read closes the stream without a reply. A malformed
//! frame gets the single-byte `InvalidMessage` reply.
//!
//! ## Outbound
//!
//! - `send_inventory_message`: announce a fingerprint to every peer
//! - `send_data_request`: fetch, verify, store and publish one node
//! - `send_sync_request`: ask a peer for everything since our newest node
//!
//! Announcements for content we lack go through the inventory deduplicator,
//! so concurrent announcements of one fingerprint cause a single fetch.

use async_trait::async_trait;
use df_01_content_model::Node;
use df_02_node_storage::StorageModule;
use futures::future::join_all;
use rand::seq::SliceRandom;
use shared_types::{unix_before, unix_now, HashSignature, PeerId};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::domain::config::{GossipConfig, MESSAGE_PROTOCOL};
use crate::domain::errors::GossipError;
use crate::domain::inventory::{InventoryHandler, LockOutcome};
use crate::domain::protocol::{
    build_data_request, build_inventory_message, build_sync_request, decode_sync_response,
    encode_sync_response, invalid_message, parse_hash_signature, parse_sync_timestamp, Frame,
    FrameHeader, ProtocolAction, HEADER_LEN,
};
use crate::domain::stats::{GossipStats, GossipStatsSnapshot};
use crate::ports::inbound::StreamHandler;
use crate::ports::outbound::{BoxedStream, PeerAddressStore, PeerNetwork};

pub struct CommunicationManager {
    config: GossipConfig,
    storage: Arc<StorageModule>,
    network: Arc<dyn PeerNetwork>,
    inventory: InventoryHandler,
    stats: GossipStats,
}

impl CommunicationManager {
    pub fn new(
        config: GossipConfig,
        storage: Arc<StorageModule>,
        network: Arc<dyn PeerNetwork>,
    ) -> Self {
        Self {
            config,
            storage,
            network,
            inventory: InventoryHandler::new(),
            stats: GossipStats::default(),
        }
    }

    pub fn protocol_id(&self) -> &'static str {
        MESSAGE_PROTOCOL
    }

    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<StorageModule> {
        &self.storage
    }

    pub fn network(&self) -> &Arc<dyn PeerNetwork> {
        &self.network
    }

    pub fn inventory(&self) -> &InventoryHandler {
        &self.inventory
    }

    pub fn stats(&self) -> GossipStatsSnapshot {
        self.stats.snapshot()
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    async fn read_frame(&self, stream: &mut BoxedStream) -> Result<Frame, GossipError> {
        let read = async {
            let mut header = [0u8; HEADER_LEN];
            stream.read_exact(&mut header).await?;
            let header = FrameHeader::parse(header);
            if !header.is_valid() {
                return Ok(Frame {
                    action: ProtocolAction::InvalidMessage,
                    payload: Vec::new(),
                });
            }
            let mut payload = vec![0u8; header.payload_len as usize];
            stream.read_exact(&mut payload).await?;
            Ok::<_, GossipError>(Frame {
                action: header.action,
                payload,
            })
        };
        timeout(self.config.read_timeout, read)
            .await
            .map_err(|_| GossipError::Timeout {
                operation: "frame read",
            })?
    }

    /// Write a response body and close our side of the stream.
    async fn respond(&self, stream: &mut BoxedStream, body: &[u8]) {
        let write = async {
            stream.write_all(body).await?;
            stream.flush().await?;
            stream.shutdown().await
        };
        if let Err(e) = write.await {
            warn!(error = %e, "[df-03] failed to write response");
        }
    }

    async fn reject(&self, stream: &mut BoxedStream) {
        self.stats.record_invalid_frame();
        self.respond(stream, &invalid_message()).await;
    }

    async fn handle_sync_request(&self, payload: &[u8], remote: &PeerId, stream: &mut BoxedStream) {
        let requested = match parse_sync_timestamp(payload) {
            Ok(time) => time,
            Err(e) => {
                warn!(peer = %remote, error = %e, "[df-03] invalid sync request");
                return self.reject(stream).await;
            }
        };

        let now = unix_now();
        if requested > now {
            warn!(peer = %remote, requested, "[df-03] sync request from the future");
            return self.reject(stream).await;
        }
        let since = requested.max(unix_before(now, self.config.sync_window));
        let fingerprints = self.storage.get_nodes_since(since);
        info!(
            peer = %remote,
            since,
            count = fingerprints.len(),
            "[df-03] serving sync request"
        );

        match encode_sync_response(&fingerprints) {
            Ok(body) => {
                self.stats.record_sync_request_served();
                self.respond(stream, &body).await;
            }
            Err(e) => {
                error!(error = %e, "[df-03] failed to encode sync response");
                self.reject(stream).await;
            }
        }
    }

    async fn handle_inventory_message(&self, payload: &[u8], remote: PeerId) {
        let fingerprint = match parse_hash_signature(payload) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                self.stats.record_invalid_frame();
                warn!(peer = %remote, error = %e, "[df-03] received invalid inventory message");
                return;
            }
        };
        self.stats.record_inventory_received();
        debug!(peer = %remote, fingerprint = %fingerprint, "[df-03] inventory message");
        self.register_inventory(fingerprint, &remote).await;
    }

    async fn handle_data_request(&self, payload: &[u8], remote: &PeerId, stream: &mut BoxedStream) {
        let fingerprint = match parse_hash_signature(payload) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!(peer = %remote, error = %e, "[df-03] received invalid data request");
                return self.reject(stream).await;
            }
        };

        let bytes = self
            .storage
            .get_node(&fingerprint, true)
            .map(|node| node.to_bytes());
        match bytes {
            Some(Ok(bytes)) => {
                debug!(peer = %remote, fingerprint = %fingerprint, "[df-03] serving data request");
                self.stats.record_data_request_served();
                self.respond(stream, &bytes).await;
            }
            Some(Err(e)) => {
                error!(fingerprint = %fingerprint, error = %e, "[df-03] failed to encode node");
                self.respond(stream, &invalid_message()).await;
            }
            None => {
                debug!(peer = %remote, fingerprint = %fingerprint, "[df-03] requested node unknown");
                self.respond(stream, &invalid_message()).await;
            }
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// One open-send-read cycle under the request timeout. The response is
    /// everything the peer writes before closing, capped at
    /// `max_response_bytes`.
    async fn request(&self, peer: &PeerId, frame: &[u8]) -> Result<Vec<u8>, GossipError> {
        let limit = self.config.max_response_bytes;
        let exchange = async {
            let mut stream = self.network.open_stream(peer, MESSAGE_PROTOCOL).await?;
            stream.write_all(frame).await?;
            stream.flush().await?;
            let mut body = Vec::new();
            (&mut stream)
                .take(limit as u64 + 1)
                .read_to_end(&mut body)
                .await?;
            Ok::<_, GossipError>(body)
        };

        let body = timeout(self.config.request_timeout, exchange)
            .await
            .map_err(|_| GossipError::Timeout {
                operation: "request",
            })??;
        if body.len() > limit {
            return Err(GossipError::ResponseTooLarge { limit });
        }
        if body.is_empty() {
            return Err(GossipError::EmptyResponse);
        }
        Ok(body)
    }

    /// Fire-and-forget send of one frame.
    async fn send_frame(&self, peer: &PeerId, frame: &[u8]) -> Result<(), GossipError> {
        let send = async {
            let mut stream = self.network.open_stream(peer, MESSAGE_PROTOCOL).await?;
            stream.write_all(frame).await?;
            stream.flush().await?;
            stream.shutdown().await?;
            Ok::<_, GossipError>(())
        };
        timeout(self.config.request_timeout, send)
            .await
            .map_err(|_| GossipError::Timeout { operation: "send" })?
    }

    /// Announce `fingerprint` to every connected peer speaking the protocol.
    /// Returns the number of peers reached.
    pub async fn send_inventory_message(&self, fingerprint: HashSignature) -> usize {
        let frame = build_inventory_message(&fingerprint);
        let peers: Vec<PeerId> = self
            .network
            .connected_peers()
            .into_iter()
            .filter(|peer| self.network.supports_protocol(peer, MESSAGE_PROTOCOL))
            .collect();

        let frame = &frame;
        let sends = peers.iter().map(|peer| async move {
            let result = self.send_frame(peer, frame).await;
            if let Err(e) = &result {
                warn!(peer = %peer, error = %e, "[df-03] failed to send inventory message");
            }
            result.is_ok()
        });
        let reached = join_all(sends).await.into_iter().filter(|ok| *ok).count();

        for _ in 0..reached {
            self.stats.record_inventory_sent();
        }
        info!(
            fingerprint = %fingerprint,
            reached,
            peers = peers.len(),
            "[df-03] sent inventory message"
        );
        reached
    }

    /// Fetch `fingerprint` from `peer`, then verify, store and publish it.
    ///
    /// Transport and parse failures consume one of `max_attempts`. A node
    /// that parses but fails verification ends the whole request.
    pub async fn send_data_request(&self, fingerprint: HashSignature, peer: &PeerId) -> bool {
        let frame = build_data_request(&fingerprint);
        let attempts = self.config.max_attempts;

        for attempt in 1..=attempts {
            let response = match self.request(peer, &frame).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        peer = %peer,
                        fingerprint = %fingerprint,
                        error = %e,
                        "[df-03] data request failed {attempt}/{attempts}"
                    );
                    continue;
                }
            };

            let node = match Node::from_bytes(&response) {
                Ok(node) => node,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "[df-03] invalid node received");
                    continue;
                }
            };

            if node.fingerprint() != fingerprint {
                self.stats.record_verification_failure();
                warn!(
                    peer = %peer,
                    requested = %fingerprint,
                    received = %node.fingerprint(),
                    "[df-03] peer answered with a different node"
                );
                return false;
            }
            if let Err(e) = node.verify_with_minimum(self.config.min_accepted_difficulty) {
                self.stats.record_verification_failure();
                warn!(
                    peer = %peer,
                    fingerprint = %fingerprint,
                    error = %e,
                    "[df-03] node received did not meet security verifications"
                );
                return false;
            }

            let report = self.storage.store_and_publish(Arc::new(node));
            if !report.is_complete() {
                warn!(fingerprint = %fingerprint, "[df-03] fetched node only partially stored");
            }
            self.stats.record_node_fetched();
            info!(peer = %peer, fingerprint = %fingerprint, "[df-03] fetched node");
            return true;
        }
        false
    }

    /// Ask `peer` for every fingerprint since our newest node and fetch the
    /// unknown ones. Returns the number of fingerprints announced.
    ///
    /// A stored node dated in the future never pushes the request past our
    /// own clock, since peers refuse sync requests from the future.
    pub async fn send_sync_request(&self, peer: &PeerId) -> Result<usize, GossipError> {
        let since = self.storage.time_of_most_recent_node().min(unix_now());
        info!(peer = %peer, since, "[df-03] sending sync request");

        let body = self.request(peer, &build_sync_request(since)).await?;
        let fingerprints = decode_sync_response(&body)?;
        for fingerprint in &fingerprints {
            self.register_inventory(*fingerprint, peer).await;
        }
        Ok(fingerprints.len())
    }

    /// Gated fetch of an announced fingerprint.
    ///
    /// Returns true when the node is stored locally afterwards.
    pub async fn register_inventory(&self, fingerprint: HashSignature, peer: &PeerId) -> bool {
        if self.storage.node_exists(&fingerprint) {
            return true;
        }

        let lock = self.inventory.get_lock(fingerprint);
        let outcome = lock
            .run_until_success(move || async move {
                // Another caller may have stored it before we took the lock.
                if self.storage.node_exists(&fingerprint) {
                    return true;
                }
                self.send_data_request(fingerprint, peer).await
            })
            .await;

        match outcome {
            LockOutcome::AlreadySucceeded => true,
            LockOutcome::Ran { success: true, .. } => {
                self.inventory.delete_lock(&fingerprint);
                true
            }
            LockOutcome::Ran {
                success: false,
                failures,
            } => {
                if failures >= self.config.max_inventory_failures {
                    self.inventory.delete_lock(&fingerprint);
                    self.stats.record_lock_evicted();
                    warn!(
                        fingerprint = %fingerprint,
                        failures,
                        "[df-03] giving up on inventory, left to sync"
                    );
                }
                false
            }
        }
    }

    /// Sync with a random connected peer that speaks the protocol, trying up
    /// to `max_sync_peer_picks` random picks. Returns the peer synced with.
    pub async fn sync_with_random_peer(&self) -> Option<PeerId> {
        let peers = self.network.connected_peers();
        if peers.is_empty() {
            return None;
        }

        for _ in 0..self.config.max_sync_peer_picks {
            let Some(peer) = pick_peer(&peers) else {
                break;
            };
            if !self.network.supports_protocol(&peer, MESSAGE_PROTOCOL) {
                continue;
            }
            match self.send_sync_request(&peer).await {
                Ok(count) => {
                    info!(peer = %peer, count, "[df-03] synced");
                    return Some(peer);
                }
                Err(e) => warn!(peer = %peer, error = %e, "[df-03] sync request failed"),
            }
        }
        None
    }

    /// Persist the connected peers' addresses, then close the network.
    pub async fn tear_down(&self, store: &dyn PeerAddressStore) {
        let addresses = self.network.peer_addresses();
        info!(count = addresses.len(), "[df-03] saving peer addresses");
        if let Err(e) = store.save_peer_addresses(addresses) {
            error!(error = %e, "[df-03] failed to save peer addresses");
        }
        self.network.close().await;
    }
}

fn pick_peer(peers: &[PeerId]) -> Option<PeerId> {
    peers.choose(&mut rand::thread_rng()).cloned()
}

#[async_trait]
impl StreamHandler for CommunicationManager {
    async fn handle_stream(&self, remote: PeerId, mut stream: BoxedStream) {
        let frame = match self.read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(peer = %remote, error = %e, "[df-03] failed to read message");
                return;
            }
        };

        match frame.action {
            ProtocolAction::InvalidMessage => {
                debug!(peer = %remote, "[df-03] peer sent an invalid message");
                self.reject(&mut stream).await;
            }
            ProtocolAction::SyncRequest => {
                self.handle_sync_request(&frame.payload, &remote, &mut stream)
                    .await
            }
            ProtocolAction::InventoryMessage => {
                drop(stream);
                self.handle_inventory_message(&frame.payload, remote).await
            }
            ProtocolAction::DataRequest => {
                self.handle_data_request(&frame.payload, &remote, &mut stream)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_network::{MemoryHub, MemoryNetwork};
    use df_01_content_model::{DataObject, ProofOfWorkConfig, ProofOfWorkEngine};
    use df_02_node_storage::InMemoryNodeDatabase;
    use parking_lot::Mutex;
    use shared_types::SECONDS_PER_DAY;
    use std::time::Duration;
    use tokio::io::DuplexStream;

    struct Peer {
        network: Arc<MemoryNetwork>,
        storage: Arc<StorageModule>,
        manager: Arc<CommunicationManager>,
    }

    fn spawn_peer(hub: &Arc<MemoryHub>, name: &str, config: GossipConfig) -> Peer {
        let network = Arc::new(MemoryNetwork::new(PeerId::from(name), hub.clone()));
        let storage = Arc::new(StorageModule::new(Arc::new(InMemoryNodeDatabase::new())));
        let manager = Arc::new(CommunicationManager::new(
            config,
            storage.clone(),
            network.clone(),
        ));
        hub.register(PeerId::from(name), &manager);
        Peer {
            network,
            storage,
            manager,
        }
    }

    fn engine() -> ProofOfWorkEngine {
        ProofOfWorkEngine::new(&ProofOfWorkConfig::with_difficulty(16))
    }

    fn new_node(topic: &str) -> Arc<Node> {
        Arc::new(Node::create(topic, "body", 0, HashSignature::ZERO, &engine()).unwrap())
    }

    /// Feed one inbound stream to `manager` and return our end of it.
    fn inbound(manager: &Arc<CommunicationManager>) -> DuplexStream {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .handle_stream(PeerId::from("tester"), Box::new(server))
                .await;
        });
        client
    }

    async fn exchange(manager: &Arc<CommunicationManager>, frame: &[u8]) -> Vec<u8> {
        let mut client = inbound(manager);
        client.write_all(frame).await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        reply
    }

    #[derive(Default)]
    struct RecordingStore(Mutex<Vec<String>>);

    impl PeerAddressStore for RecordingStore {
        fn save_peer_addresses(&self, addresses: Vec<String>) -> Result<(), GossipError> {
            *self.0.lock() = addresses;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_out_of_range_action_gets_invalid_reply() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        assert_eq!(exchange(&a.manager, &[9, 0, 1, 1]).await, vec![0]);
        assert_eq!(exchange(&a.manager, &[3, 0, 0]).await, vec![0]);
        assert_eq!(a.manager.stats().invalid_frames, 2);
    }

    #[tokio::test]
    async fn test_data_request_for_unknown_node_gets_invalid_reply() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let reply = exchange(&a.manager, &build_data_request(&HashSignature::new([4; 28]))).await;
        assert_eq!(reply, vec![0]);
    }

    #[tokio::test]
    async fn test_data_request_serves_node_bytes() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let node = new_node("served");
        a.storage.store_node(&node);

        let reply = exchange(&a.manager, &build_data_request(&node.fingerprint())).await;
        assert_eq!(Node::from_bytes(&reply).unwrap(), *node);
        assert_eq!(a.manager.stats().data_requests_served, 1);
    }

    #[tokio::test]
    async fn test_sync_request_from_future_is_rejected() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let reply = exchange(&a.manager, &build_sync_request(unix_now() + 3_600)).await;
        assert_eq!(reply, vec![0]);
        let reply = exchange(&a.manager, &[1, 0, 3, b'a', b'b', b'c']).await;
        assert_eq!(reply, vec![0]);
    }

    #[tokio::test]
    async fn test_sync_request_is_clamped_to_window() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let now = unix_now();
        let old = Arc::new(
            Node::stamp(
                DataObject::with_timestamp("old", "x", 0, HashSignature::ZERO, now - 30 * SECONDS_PER_DAY),
                &engine(),
            )
            .unwrap(),
        );
        let recent = new_node("recent");
        a.storage.store_node(&old);
        a.storage.store_node(&recent);

        let reply = exchange(&a.manager, &build_sync_request(now - 30 * SECONDS_PER_DAY)).await;
        assert_eq!(decode_sync_response(&reply).unwrap(), vec![recent.fingerprint()]);
    }

    #[tokio::test]
    async fn test_hanging_sender_is_dropped_after_read_timeout() {
        let hub = MemoryHub::new();
        let config = GossipConfig {
            read_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let a = spawn_peer(&hub, "a", config);

        let mut client = inbound(&a.manager);
        client.write_all(b"of").await.unwrap();
        let mut reply = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut reply)).await;
        assert!(closed.is_ok(), "inbound stream left hanging");
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_stores_and_publishes() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let b = spawn_peer(&hub, "b", GossipConfig::default());
        a.network.connect(PeerId::from("b"));
        let node = new_node("fetch me");
        b.storage.store_node(&node);

        assert!(a.manager.send_data_request(node.fingerprint(), &PeerId::from("b")).await);
        assert!(a.storage.node_exists(&node.fingerprint()));
        assert_eq!(a.manager.stats().nodes_fetched, 1);
    }

    #[tokio::test]
    async fn test_missing_node_exhausts_attempts() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let b = spawn_peer(&hub, "b", GossipConfig::default());
        a.network.connect(PeerId::from("b"));

        let missing = HashSignature::new([3; 28]);
        assert!(!a.manager.send_data_request(missing, &PeerId::from("b")).await);
        assert_eq!(b.manager.stats().invalid_frames, 0);
        assert!(!a.storage.node_exists(&missing));
    }

    #[tokio::test]
    async fn test_oversize_response_is_rejected() {
        let hub = MemoryHub::new();
        let config = GossipConfig {
            max_response_bytes: 64,
            ..Default::default()
        };
        let a = spawn_peer(&hub, "a", config);
        let b = spawn_peer(&hub, "b", GossipConfig::default());
        a.network.connect(PeerId::from("b"));
        let node = new_node("this node serializes to far more than sixty-four bytes");
        b.storage.store_node(&node);

        assert!(!a.manager.send_data_request(node.fingerprint(), &PeerId::from("b")).await);
        assert!(!a.storage.node_exists(&node.fingerprint()));
        assert_eq!(a.manager.stats().nodes_fetched, 0);
    }

    #[tokio::test]
    async fn test_weak_proof_rejected_by_local_minimum() {
        let hub = MemoryHub::new();
        let config = GossipConfig {
            min_accepted_difficulty: 20,
            ..Default::default()
        };
        let a = spawn_peer(&hub, "a", config);
        let b = spawn_peer(&hub, "b", GossipConfig::default());
        a.network.connect(PeerId::from("b"));
        let node = new_node("weak");
        b.storage.store_node(&node);

        assert!(!a.manager.send_data_request(node.fingerprint(), &PeerId::from("b")).await);
        assert_eq!(a.manager.stats().verification_failures, 1);
        assert_eq!(b.manager.stats().data_requests_served, 1);
    }

    #[tokio::test]
    async fn test_failing_inventory_lock_is_evicted() {
        let hub = MemoryHub::new();
        let config = GossipConfig {
            max_attempts: 1,
            max_inventory_failures: 2,
            ..Default::default()
        };
        let a = spawn_peer(&hub, "a", config);
        let _b = spawn_peer(&hub, "b", GossipConfig::default());
        a.network.connect(PeerId::from("b"));
        let missing = HashSignature::new([8; 28]);

        assert!(!a.manager.register_inventory(missing, &PeerId::from("b")).await);
        assert!(a.manager.inventory().contains(&missing));
        assert!(!a.manager.register_inventory(missing, &PeerId::from("b")).await);
        assert!(!a.manager.inventory().contains(&missing));
        assert_eq!(a.manager.stats().locks_evicted, 1);
    }

    #[tokio::test]
    async fn test_sync_fetches_unknown_nodes() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let b = spawn_peer(&hub, "b", GossipConfig::default());
        a.network.connect(PeerId::from("b"));
        let first = new_node("one");
        let second = new_node("two");
        b.storage.store_node(&first);
        b.storage.store_node(&second);

        assert_eq!(a.manager.sync_with_random_peer().await, Some(PeerId::from("b")));
        assert!(a.storage.node_exists(&first.fingerprint()));
        assert!(a.storage.node_exists(&second.fingerprint()));
        assert!(a.manager.inventory().is_empty());
    }

    #[tokio::test]
    async fn test_future_dated_node_does_not_stall_sync() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let b = spawn_peer(&hub, "b", GossipConfig::default());
        a.network.connect(PeerId::from("b"));
        let now = unix_now();
        let future = Arc::new(
            Node::stamp(
                DataObject::with_timestamp("future", "x", 0, HashSignature::ZERO, now + 365 * SECONDS_PER_DAY),
                &engine(),
            )
            .unwrap(),
        );
        b.storage.store_node(&future);
        assert!(a.manager.register_inventory(future.fingerprint(), &PeerId::from("b")).await);
        assert!(a.storage.time_of_most_recent_node() > now);

        assert!(a.manager.send_sync_request(&PeerId::from("b")).await.is_ok());
        assert_eq!(b.manager.stats().sync_requests_served, 1);
        assert_eq!(b.manager.stats().invalid_frames, 0);
    }

    /// Memory network whose streams to one peer never open.
    struct RefusingNetwork {
        inner: MemoryNetwork,
        refused: PeerId,
    }

    #[async_trait]
    impl PeerNetwork for RefusingNetwork {
        fn local_peer(&self) -> PeerId {
            self.inner.local_peer()
        }

        fn connected_peers(&self) -> Vec<PeerId> {
            self.inner.connected_peers()
        }

        async fn open_stream(&self, peer: &PeerId, protocol: &str) -> Result<BoxedStream, GossipError> {
            if *peer == self.refused {
                return Err(GossipError::StreamUnavailable {
                    peer: peer.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            self.inner.open_stream(peer, protocol).await
        }

        fn supports_protocol(&self, peer: &PeerId, protocol: &str) -> bool {
            self.inner.supports_protocol(peer, protocol)
        }

        fn peer_addresses(&self) -> Vec<String> {
            self.inner.peer_addresses()
        }

        async fn close(&self) {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_inventory_broadcast_survives_failing_peer() {
        let hub = MemoryHub::new();
        let healthy = spawn_peer(&hub, "healthy", GossipConfig::default());
        let _refusing = spawn_peer(&hub, "refusing", GossipConfig::default());
        drop(spawn_peer(&hub, "gone", GossipConfig::default()));

        let network = Arc::new(RefusingNetwork {
            inner: MemoryNetwork::new(PeerId::from("a"), hub.clone()),
            refused: PeerId::from("refusing"),
        });
        for name in ["healthy", "refusing", "gone"] {
            network.inner.connect(PeerId::from(name));
        }
        let storage = Arc::new(StorageModule::new(Arc::new(InMemoryNodeDatabase::new())));
        let manager = Arc::new(CommunicationManager::new(
            GossipConfig::default(),
            storage,
            network.clone(),
        ));
        hub.register(PeerId::from("a"), &manager);

        assert!(!network.supports_protocol(&PeerId::from("gone"), MESSAGE_PROTOCOL));
        assert!(network.supports_protocol(&PeerId::from("refusing"), MESSAGE_PROTOCOL));

        let reached = manager.send_inventory_message(HashSignature::new([6; 28])).await;
        assert_eq!(reached, 1);
        assert_eq!(manager.stats().inventory_sent, 1);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while healthy.manager.stats().inventory_received == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(healthy.manager.stats().inventory_received, 1);
    }

    #[tokio::test]
    async fn test_sync_without_peers_does_nothing() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        assert_eq!(a.manager.sync_with_random_peer().await, None);
    }

    #[tokio::test]
    async fn test_tear_down_saves_peers_and_closes() {
        let hub = MemoryHub::new();
        let a = spawn_peer(&hub, "a", GossipConfig::default());
        let _b = spawn_peer(&hub, "b", GossipConfig::default());
        a.network.connect(PeerId::from("b"));

        let store = RecordingStore::default();
        a.manager.tear_down(&store).await;
        assert_eq!(*store.0.lock(), vec!["/memory/b".to_string()]);
        assert!(a.network.is_closed());
    }
}
