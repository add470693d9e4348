//! # Gossip Flows
//!
//! Peers exchanging nodes over the in-memory network.
//!
//! ## Flows Tested:
//!
//! 1. **Sync window**: a sync request reaching back further than 14 days is
//!    answered from the 14-day floor only
//! 2. **Inventory storm**: ten peers announcing the same node cause one fetch
//! 3. **Relay**: a node published on one peer reaches peers two hops away
//! 4. **Hanging peer**: a peer that never answers costs bounded time

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use df_01_content_model::Node;
    use df_03_gossip::domain::protocol::{
        build_data_request, build_inventory_message, build_sync_request, decode_sync_response,
    };
    use df_03_gossip::{
        decode_frame, encode_frame, start_inventory_relay, GossipConfig, MemoryHub, PeerNetwork,
        ProtocolAction, StreamHandler,
    };
    use futures::future::join_all;
    use shared_types::{unix_now, HashSignature, SECONDS_PER_DAY};
    use tokio::io::AsyncWriteExt;
    use tokio::time::{sleep, timeout, Instant};

    use crate::fixtures::{node, node_at, HangingPeer, TestPeer};

    // =========================================================================
    // SYNC WINDOW
    // =========================================================================

    #[tokio::test]
    async fn test_sync_from_epoch_is_clamped_to_window() {
        let hub = MemoryHub::new();
        let server = TestPeer::spawn(&hub, "server", GossipConfig::default());

        let now = unix_now();
        let ancient = node_at("ancient", HashSignature::ZERO, now - 20 * SECONDS_PER_DAY);
        let recent = node_at("recent", HashSignature::ZERO, now - SECONDS_PER_DAY);
        let fresh = node("fresh", HashSignature::ZERO);
        for n in [&ancient, &recent, &fresh] {
            server.storage.store_node(n);
        }

        let reply = server.exchange("client", &build_sync_request(0)).await;
        let mut listed = decode_sync_response(&reply).unwrap();
        listed.sort();
        let mut expected = vec![recent.fingerprint(), fresh.fingerprint()];
        expected.sort();
        assert_eq!(listed, expected);

        // A timestamp past the server's clock is refused outright.
        let reply = server
            .exchange("client", &build_sync_request(now + 3600))
            .await;
        assert_eq!(reply, vec![0]);
        assert_eq!(server.manager.stats().sync_requests_served, 1);
    }

    #[tokio::test]
    async fn test_sync_request_fetches_missing_nodes() {
        let hub = MemoryHub::new();
        let server = TestPeer::spawn(&hub, "server", GossipConfig::default());
        let client = TestPeer::spawn(&hub, "client", GossipConfig::default());
        client.link(&server);

        let topic = node("topic", HashSignature::ZERO);
        let reply = node("reply", topic.fingerprint());
        server.storage.store_node(&topic);
        server.storage.store_node(&reply);

        let count = client
            .manager
            .send_sync_request(&server.id)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert!(client.storage.node_exists(&topic.fingerprint()));
        assert!(client.storage.node_exists(&reply.fingerprint()));
        assert_eq!(client.manager.stats().nodes_fetched, 2);
    }

    // =========================================================================
    // INVENTORY STORM
    // =========================================================================

    #[tokio::test]
    async fn test_concurrent_inventory_fetches_once() {
        let hub = MemoryHub::new();
        let server = TestPeer::spawn(&hub, "server", GossipConfig::default());
        let client = TestPeer::spawn(&hub, "client", GossipConfig::default());

        let announced = node("popular", HashSignature::ZERO);
        server.storage.store_node(&announced);

        // Ten announcing peer ids, all answered by the same server.
        let names: Vec<String> = (0..10).map(|i| format!("announcer-{i}")).collect();
        for name in &names {
            hub.register(name.as_str().into(), &server.manager);
            client.network.connect(name.as_str().into());
        }

        let frame = build_inventory_message(&announced.fingerprint());
        let replies = join_all(names.iter().map(|name| client.exchange(name, &frame))).await;
        assert!(replies.iter().all(|reply| reply.is_empty()));

        assert!(client.storage.node_exists(&announced.fingerprint()));
        assert_eq!(client.database.index_sizes(), (1, 1, 1));
        assert_eq!(server.manager.stats().data_requests_served, 1);
        assert_eq!(client.manager.stats().inventory_received, 10);
        assert_eq!(client.manager.stats().nodes_fetched, 1);
        // The successful lock is released.
        assert!(client.manager.inventory().is_empty());
    }

    #[tokio::test]
    async fn test_inventory_for_known_node_is_ignored() {
        let hub = MemoryHub::new();
        let server = TestPeer::spawn(&hub, "server", GossipConfig::default());
        let client = TestPeer::spawn(&hub, "client", GossipConfig::default());
        client.link(&server);

        let known = node("known", HashSignature::ZERO);
        server.storage.store_node(&known);
        client.storage.store_node(&known);

        client
            .exchange("server", &build_inventory_message(&known.fingerprint()))
            .await;
        assert_eq!(server.manager.stats().data_requests_served, 0);
    }

    // =========================================================================
    // RELAY
    // =========================================================================

    async fn wait_for(peer: &TestPeer, fingerprint: &HashSignature) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if peer.storage.node_exists(fingerprint) {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_published_node_travels_two_hops() {
        let hub = MemoryHub::new();
        let a = TestPeer::spawn(&hub, "a", GossipConfig::default());
        let b = TestPeer::spawn(&hub, "b", GossipConfig::default());
        let c = TestPeer::spawn(&hub, "c", GossipConfig::default());
        a.link(&b);
        b.link(&c);
        let _relays = [
            start_inventory_relay(&a.manager),
            start_inventory_relay(&b.manager),
            start_inventory_relay(&c.manager),
        ];

        let created = node("hello", HashSignature::ZERO);
        a.storage.store_and_publish(Arc::clone(&created));

        assert!(wait_for(&b, &created.fingerprint()).await);
        assert!(wait_for(&c, &created.fingerprint()).await);
        assert!(!a.network.connected_peers().contains(&c.id));

        let at_c = c.storage.get_node(&created.fingerprint(), false).unwrap();
        assert_eq!(*at_c, *created);
        assert!(at_c.verify());
    }

    // =========================================================================
    // HANGING PEER
    // =========================================================================

    #[tokio::test]
    async fn test_hanging_peer_costs_bounded_time() {
        let hub = MemoryHub::new();
        let config = GossipConfig {
            request_timeout: Duration::from_millis(100),
            ..GossipConfig::default()
        };
        let client = TestPeer::spawn(&hub, "client", config);
        let hanging = Arc::new(HangingPeer);
        hub.register("hanging".into(), &hanging);
        client.network.connect("hanging".into());

        let wanted = node("never", HashSignature::ZERO);
        let started = Instant::now();
        let fetched = timeout(
            Duration::from_secs(5),
            client
                .manager
                .send_data_request(wanted.fingerprint(), &"hanging".into()),
        )
        .await
        .unwrap();

        assert!(!fetched);
        // Five attempts of 100ms each.
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(!client.storage.node_exists(&wanted.fingerprint()));
    }

    #[tokio::test]
    async fn test_hanging_client_does_not_block_server() {
        let hub = MemoryHub::new();
        let config = GossipConfig {
            read_timeout: Duration::from_millis(100),
            ..GossipConfig::default()
        };
        let server = TestPeer::spawn(&hub, "server", config);
        let served = node("served", HashSignature::ZERO);
        server.storage.store_node(&served);

        // A client that sends half a header and stalls.
        let (mut stalled, stream) = tokio::io::duplex(1024);
        stalled.write_all(&[3u8]).await.unwrap();
        let manager = Arc::clone(&server.manager);
        let stalled_task = tokio::spawn(async move {
            manager
                .handle_stream("stalled".into(), Box::new(stream))
                .await;
        });

        let reply = server
            .exchange("client", &build_data_request(&served.fingerprint()))
            .await;
        assert_eq!(Node::from_bytes(&reply).unwrap().fingerprint(), served.fingerprint());

        timeout(Duration::from_secs(2), stalled_task)
            .await
            .unwrap()
            .unwrap();
        drop(stalled);
    }

    // =========================================================================
    // CODEC
    // =========================================================================

    #[test]
    fn test_node_survives_frame_round_trip() {
        let original = node("codec", HashSignature::ZERO);
        let frame = encode_frame(ProtocolAction::DataRequest, &original.to_bytes().unwrap()).unwrap();

        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.action, ProtocolAction::DataRequest);
        let node = Node::from_bytes(&decoded.payload).unwrap();
        assert_eq!(node.fingerprint(), original.fingerprint());
        assert!(node.verify());
    }
}
