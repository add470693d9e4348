use shared_types::SYNC_WINDOW;
use std::time::Duration;

/// Protocol id the gossip handler is registered under.
pub const MESSAGE_PROTOCOL: &str = "/libp2p/DDF/0.0.1";

/// Gossip timing and resource limits.
#[derive(Clone, Debug)]
pub struct GossipConfig {
    /// Deadline for reading an inbound frame (header and body together).
    pub read_timeout: Duration,
    /// Deadline for one open-send-await-response cycle.
    pub request_timeout: Duration,
    /// Attempts per data request.
    pub max_attempts: u32,
    /// Oldest point an inbound sync request may reach.
    pub sync_window: Duration,
    /// Largest response body accepted from a peer.
    pub max_response_bytes: usize,
    /// Failed fetch chains after which an inventory lock is evicted.
    pub max_inventory_failures: u32,
    /// Local floor on the difficulty declared by received nodes. 0 disables it.
    pub min_accepted_difficulty: u32,
    /// Random peers tried when syncing on startup.
    pub max_sync_peer_picks: usize,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(4),
            max_attempts: 5,
            sync_window: SYNC_WINDOW,
            max_response_bytes: 16 * 1024 * 1024, // 16 MiB
            max_inventory_failures: 5,
            min_accepted_difficulty: 0,
            max_sync_peer_picks: 10,
        }
    }
}
