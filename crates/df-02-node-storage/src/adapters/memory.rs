//! In-memory node database.
//!
//! Ordered maps give the same scan semantics as the RocksDB backend, so the
//! storage service and the gossip layer can be tested without disk.

use parking_lot::RwLock;
use shared_types::{HashSignature, UnixTime};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::domain::errors::{StorageError, StorageIndex};
use crate::domain::keys::{self, EDGE_KEY_LEN, TIMESTAMP_KEY_LEN};
use crate::ports::outbound::NodeDatabase;

#[derive(Default)]
struct Indexes {
    nodes: BTreeMap<HashSignature, Vec<u8>>,
    edges: BTreeSet<[u8; EDGE_KEY_LEN]>,
    timestamps: BTreeSet<[u8; TIMESTAMP_KEY_LEN]>,
}

#[derive(Default)]
pub struct InMemoryNodeDatabase {
    indexes: RwLock<Option<Indexes>>,
    failing: RwLock<HashSet<StorageIndex>>,
}

impl InMemoryNodeDatabase {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(Some(Indexes::default())),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Make every write to `index` fail. Used to exercise partial writes.
    pub fn fail_writes_to(&self, index: StorageIndex) {
        self.failing.write().insert(index);
    }

    /// Number of entries in each index: (nodes, edges, timestamps).
    pub fn index_sizes(&self) -> (usize, usize, usize) {
        self.indexes
            .read()
            .as_ref()
            .map(|i| (i.nodes.len(), i.edges.len(), i.timestamps.len()))
            .unwrap_or_default()
    }

    fn check_writable(&self, index: StorageIndex) -> Result<(), StorageError> {
        if self.failing.read().contains(&index) {
            return Err(StorageError::Backend {
                message: format!("injected write failure on {index}"),
            });
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Indexes) -> T) -> Result<T, StorageError> {
        self.indexes.read().as_ref().map(f).ok_or(StorageError::Closed)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Indexes) -> T) -> Result<T, StorageError> {
        self.indexes.write().as_mut().map(f).ok_or(StorageError::Closed)
    }
}

impl NodeDatabase for InMemoryNodeDatabase {
    fn put_node(&self, fingerprint: &HashSignature, bytes: &[u8]) -> Result<(), StorageError> {
        self.check_writable(StorageIndex::Nodes)?;
        self.write(|i| {
            i.nodes.insert(*fingerprint, bytes.to_vec());
        })
    }

    fn put_edge(&self, parent: &HashSignature, child: &HashSignature) -> Result<(), StorageError> {
        self.check_writable(StorageIndex::Edges)?;
        self.write(|i| {
            i.edges.insert(keys::edge_key(parent, child));
        })
    }

    fn put_timestamp(
        &self,
        timestamp: UnixTime,
        fingerprint: &HashSignature,
    ) -> Result<(), StorageError> {
        self.check_writable(StorageIndex::Timestamps)?;
        self.write(|i| {
            i.timestamps.insert(keys::timestamp_key(timestamp, fingerprint));
        })
    }

    fn get_node(&self, fingerprint: &HashSignature) -> Result<Option<Vec<u8>>, StorageError> {
        self.read(|i| i.nodes.get(fingerprint).cloned())
    }

    fn has_node(&self, fingerprint: &HashSignature) -> Result<bool, StorageError> {
        self.read(|i| i.nodes.contains_key(fingerprint))
    }

    fn children(&self, parent: &HashSignature) -> Result<Vec<HashSignature>, StorageError> {
        let start = keys::edge_key(parent, &HashSignature::ZERO);
        self.read(|i| {
            i.edges
                .range(start..)
                .take_while(|key| key.starts_with(parent.as_bytes()))
                .filter_map(|key| keys::edge_child(key))
                .collect()
        })
    }

    fn fingerprints_between(
        &self,
        since: UnixTime,
        until: UnixTime,
    ) -> Result<Vec<HashSignature>, StorageError> {
        let start = keys::time_prefix(since);
        let end = keys::time_prefix(until);
        self.read(|i| {
            i.timestamps
                .iter()
                .skip_while(|key| key[..8] < start[..])
                .take_while(|key| key[..8] < end[..])
                .filter_map(|key| keys::parse_timestamp_key(key).map(|(_, fp)| fp))
                .collect()
        })
    }

    fn latest_timestamp(&self) -> Result<Option<UnixTime>, StorageError> {
        self.read(|i| {
            i.timestamps
                .iter()
                .next_back()
                .and_then(|key| keys::parse_timestamp_key(key))
                .map(|(time, _)| time)
        })
    }

    fn close(&self) -> Result<(), StorageError> {
        self.indexes.write().take();
        Ok(())
    }
}
