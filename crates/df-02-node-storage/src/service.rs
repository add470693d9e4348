//! # Storage Service
//!
//! `StorageModule` owns the cache, the persistent store and the listener
//! registry. Read paths degrade to "absent" on backend errors and log them;
//! write paths report per-index failures.

use df_01_content_model::Node;
use parking_lot::RwLock;
use shared_types::{sync_floor, unix_now, HashSignature, UnixTime};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::domain::cache::NodeCache;
use crate::domain::errors::{StorageError, StoreReport};
use crate::ports::outbound::{NodeDatabase, NodeListener};

/// Children returned when the caller asks for `max <= 0`.
pub const DEFAULT_CHILDREN_LIMIT: usize = 50;

pub struct StorageModule {
    database: Arc<dyn NodeDatabase>,
    cache: NodeCache,
    listeners: RwLock<Vec<Arc<dyn NodeListener>>>,
}

impl StorageModule {
    pub fn new(database: Arc<dyn NodeDatabase>) -> Self {
        Self {
            database,
            cache: NodeCache::new(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Cache hit in either map, else a persistent lookup. A persistent hit is
    /// remembered hash-only.
    pub fn node_exists(&self, fingerprint: &HashSignature) -> bool {
        if self.cache.contains(fingerprint) {
            return true;
        }
        match self.database.has_node(fingerprint) {
            Ok(true) => {
                self.cache.remember_hash(*fingerprint);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "[df-02] existence check failed");
                false
            }
        }
    }

    /// Fetch a node. With `should_cache`, a persistent hit is kept in the
    /// full-node cache for repeat requests.
    pub fn get_node(&self, fingerprint: &HashSignature, should_cache: bool) -> Option<Arc<Node>> {
        if let Some(node) = self.cache.get(fingerprint) {
            return Some(node);
        }

        let bytes = match self.database.get_node(fingerprint) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "[df-02] node lookup failed");
                return None;
            }
        };

        let node = match Node::from_bytes(&bytes) {
            Ok(node) => Arc::new(node),
            Err(e) => {
                error!(fingerprint = %fingerprint, error = %e, "[df-02] stored node does not parse");
                return None;
            }
        };

        if should_cache {
            self.cache.insert(node.clone());
        }
        Some(node)
    }

    /// Write the node to all three indexes and cache it.
    ///
    /// Each index is attempted even if an earlier one failed. Storing the
    /// same node again rewrites identical keys.
    pub fn store_node(&self, node: &Arc<Node>) -> StoreReport {
        let fingerprint = node.fingerprint();

        let node_result = node
            .to_bytes()
            .map_err(|e| StorageError::Backend {
                message: e.to_string(),
            })
            .and_then(|bytes| self.database.put_node(&fingerprint, &bytes));
        let report = StoreReport {
            node: node_result,
            edge: self.database.put_edge(&node.parent(), &fingerprint),
            timestamp: self.database.put_timestamp(node.timestamp(), &fingerprint),
        };

        for (index, e) in report.failures() {
            error!(
                fingerprint = %fingerprint,
                index = %index,
                error = %e,
                "[df-02] index write failed"
            );
        }

        self.cache.insert(node.clone());
        debug!(fingerprint = %fingerprint, complete = report.is_complete(), "[df-02] node stored");
        report
    }

    /// Notify every listener, in registration order.
    pub fn publish_node(&self, node: &Arc<Node>) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_new_node(node);
        }
    }

    pub fn store_and_publish(&self, node: Arc<Node>) -> StoreReport {
        let report = self.store_node(&node);
        self.publish_node(&node);
        report
    }

    /// Register a listener for the rest of the process lifetime.
    pub fn subscribe(&self, listener: Arc<dyn NodeListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Up to `max` children of `parent` (50 when `max <= 0`), in edge-key
    /// order, optionally preceded by the parent itself.
    pub fn get_children_nodes(
        &self,
        parent: &HashSignature,
        include_parent: bool,
        max: i32,
    ) -> Vec<Arc<Node>> {
        let limit = if max <= 0 {
            DEFAULT_CHILDREN_LIMIT
        } else {
            max as usize
        };
        self.collect_children(parent, include_parent, Some(limit))
    }

    /// Every child of the synthetic all-zero root.
    pub fn get_top_level_nodes(&self) -> Vec<Arc<Node>> {
        self.collect_children(&HashSignature::ZERO, false, None)
    }

    fn collect_children(
        &self,
        parent: &HashSignature,
        include_parent: bool,
        limit: Option<usize>,
    ) -> Vec<Arc<Node>> {
        let mut result = Vec::new();
        if include_parent {
            if let Some(node) = self.get_node(parent, false) {
                result.push(node);
            }
        }

        let children = match self.database.children(parent) {
            Ok(children) => children,
            Err(e) => {
                warn!(parent = %parent, error = %e, "[df-02] edge scan failed");
                return result;
            }
        };

        let resolved = children
            .iter()
            .filter_map(|child| self.get_node(child, false))
            .take(limit.unwrap_or(usize::MAX));
        result.extend(resolved);
        result
    }

    /// Fingerprints recorded from `since` through the current second.
    pub fn get_nodes_since(&self, since: UnixTime) -> Vec<HashSignature> {
        let since = since.max(0);
        let until = unix_now() + 1;
        self.database
            .fingerprints_between(since, until)
            .unwrap_or_else(|e| {
                warn!(since, error = %e, "[df-02] timestamp scan failed");
                Vec::new()
            })
    }

    /// Timestamp of the newest stored node, or 14 days ago if none.
    pub fn time_of_most_recent_node(&self) -> UnixTime {
        match self.database.latest_timestamp() {
            Ok(Some(time)) => time,
            Ok(None) => sync_floor(unix_now()),
            Err(e) => {
                warn!(error = %e, "[df-02] latest timestamp lookup failed");
                sync_floor(unix_now())
            }
        }
    }

    /// Close the store and drop the cache.
    pub fn tear_down(&self) -> Result<(), StorageError> {
        self.cache.clear();
        self.database.close()
    }
}
