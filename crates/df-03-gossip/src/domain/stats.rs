//! Gossip counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct GossipStats {
    inventory_received: AtomicU64,
    inventory_sent: AtomicU64,
    data_requests_served: AtomicU64,
    sync_requests_served: AtomicU64,
    nodes_fetched: AtomicU64,
    verification_failures: AtomicU64,
    invalid_frames: AtomicU64,
    locks_evicted: AtomicU64,
}

/// Point-in-time copy of [`GossipStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GossipStatsSnapshot {
    pub inventory_received: u64,
    pub inventory_sent: u64,
    pub data_requests_served: u64,
    pub sync_requests_served: u64,
    pub nodes_fetched: u64,
    pub verification_failures: u64,
    pub invalid_frames: u64,
    pub locks_evicted: u64,
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl GossipStats {
    counter! {
        record_inventory_received => inventory_received,
        record_inventory_sent => inventory_sent,
        record_data_request_served => data_requests_served,
        record_sync_request_served => sync_requests_served,
        record_node_fetched => nodes_fetched,
        record_verification_failure => verification_failures,
        record_invalid_frame => invalid_frames,
        record_lock_evicted => locks_evicted,
    }

    pub fn snapshot(&self) -> GossipStatsSnapshot {
        GossipStatsSnapshot {
            inventory_received: self.inventory_received.load(Ordering::Relaxed),
            inventory_sent: self.inventory_sent.load(Ordering::Relaxed),
            data_requests_served: self.data_requests_served.load(Ordering::Relaxed),
            sync_requests_served: self.sync_requests_served.load(Ordering::Relaxed),
            nodes_fetched: self.nodes_fetched.load(Ordering::Relaxed),
            verification_failures: self.verification_failures.load(Ordering::Relaxed),
            invalid_frames: self.invalid_frames.load(Ordering::Relaxed),
            locks_evicted: self.locks_evicted.load(Ordering::Relaxed),
        }
    }
}
