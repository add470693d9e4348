//! In-memory cache in front of the persistent store.

use df_01_content_model::Node;
use parking_lot::RwLock;
use shared_types::HashSignature;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Two maps behind read/write locks:
///
/// - `hashes`: fingerprints known to exist, without their bodies
/// - `nodes`: fully materialized nodes
///
/// Entries are never evicted; nodes are kept for the process lifetime.
#[derive(Default)]
pub struct NodeCache {
    hashes: RwLock<HashSet<HashSignature>>,
    nodes: RwLock<HashMap<HashSignature, Arc<Node>>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hit in either map.
    pub fn contains(&self, fingerprint: &HashSignature) -> bool {
        self.nodes.read().contains_key(fingerprint) || self.hashes.read().contains(fingerprint)
    }

    pub fn get(&self, fingerprint: &HashSignature) -> Option<Arc<Node>> {
        self.nodes.read().get(fingerprint).cloned()
    }

    pub fn remember_hash(&self, fingerprint: HashSignature) {
        self.hashes.write().insert(fingerprint);
    }

    pub fn insert(&self, node: Arc<Node>) {
        self.nodes.write().insert(node.fingerprint(), node);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn clear(&self) {
        self.hashes.write().clear();
        self.nodes.write().clear();
    }
}
