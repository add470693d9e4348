//! # RocksDB Node Database
//!
//! Persistent backend with one column family per index:
//!
//! - `nodes` - fingerprint → serialized node
//! - `edges` - parent ‖ child → empty
//! - `timestamps` - be64(time) ‖ fingerprint → empty
//!
//! Tuned for small values and prefix/range scans: bloom filters on point
//! lookups, Snappy compression, LRU block cache.

use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteOptions, DB};
use shared_types::{HashSignature, UnixTime};
use tracing::info;

use crate::domain::errors::{StorageError, StorageIndex};
use crate::domain::keys;
use crate::ports::outbound::NodeDatabase;

pub const CF_NODES: &str = "nodes";
pub const CF_EDGES: &str = "edges";
pub const CF_TIMESTAMPS: &str = "timestamps";

pub const COLUMN_FAMILIES: &[&str] = &[CF_NODES, CF_EDGES, CF_TIMESTAMPS];

#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Database directory.
    pub path: String,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: false; the gossip layer re-fetches lost nodes)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "database/".to_string(),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

impl RocksDbConfig {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Small buffers for tests.
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksDbNodeDatabase {
    db: RwLock<Option<DB>>,
    config: RocksDbConfig,
}

impl RocksDbNodeDatabase {
    /// Open or create the database. Failure here is fatal to the node.
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors).map_err(|e| {
            StorageError::Open {
                path: config.path.clone(),
                message: e.to_string(),
            }
        })?;

        info!("[df-02] 💾 Opened node database at {}", config.path);
        Ok(Self {
            db: RwLock::new(Some(db)),
            config,
        })
    }

    fn cf_name(index: StorageIndex) -> &'static str {
        match index {
            StorageIndex::Nodes => CF_NODES,
            StorageIndex::Edges => CF_EDGES,
            StorageIndex::Timestamps => CF_TIMESTAMPS,
        }
    }

    fn put(&self, index: StorageIndex, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StorageError::Closed)?;
        let cf = db.cf_handle(Self::cf_name(index)).ok_or_else(|| missing_cf(index))?;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        db.put_cf_opt(cf, key, value, &write_opts)
            .map_err(|e| backend("put", index, e))
    }

    /// Collect keys of `index` from `start` while `keep` holds.
    fn scan_keys(
        &self,
        index: StorageIndex,
        start: &[u8],
        keep: impl Fn(&[u8]) -> bool,
    ) -> Result<Vec<Box<[u8]>>, StorageError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StorageError::Closed)?;
        let cf = db.cf_handle(Self::cf_name(index)).ok_or_else(|| missing_cf(index))?;

        let mut keys = Vec::new();
        for item in db.iterator_cf(cf, IteratorMode::From(start, Direction::Forward)) {
            let (key, _) = item.map_err(|e| backend("scan", index, e))?;
            if !keep(&key[..]) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

fn missing_cf(index: StorageIndex) -> StorageError {
    StorageError::Backend {
        message: format!("column family {} missing", index),
    }
}

fn backend(op: &str, index: StorageIndex, e: rocksdb::Error) -> StorageError {
    StorageError::Backend {
        message: format!("RocksDB {op} on {index} failed: {e}"),
    }
}

impl NodeDatabase for RocksDbNodeDatabase {
    fn put_node(&self, fingerprint: &HashSignature, bytes: &[u8]) -> Result<(), StorageError> {
        self.put(StorageIndex::Nodes, &keys::node_key(fingerprint), bytes)
    }

    fn put_edge(&self, parent: &HashSignature, child: &HashSignature) -> Result<(), StorageError> {
        self.put(StorageIndex::Edges, &keys::edge_key(parent, child), &[])
    }

    fn put_timestamp(
        &self,
        timestamp: UnixTime,
        fingerprint: &HashSignature,
    ) -> Result<(), StorageError> {
        self.put(
            StorageIndex::Timestamps,
            &keys::timestamp_key(timestamp, fingerprint),
            &[],
        )
    }

    fn get_node(&self, fingerprint: &HashSignature) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StorageError::Closed)?;
        let cf = db
            .cf_handle(CF_NODES)
            .ok_or_else(|| missing_cf(StorageIndex::Nodes))?;
        db.get_cf(cf, keys::node_key(fingerprint))
            .map_err(|e| backend("get", StorageIndex::Nodes, e))
    }

    fn has_node(&self, fingerprint: &HashSignature) -> Result<bool, StorageError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StorageError::Closed)?;
        let cf = db
            .cf_handle(CF_NODES)
            .ok_or_else(|| missing_cf(StorageIndex::Nodes))?;
        db.get_pinned_cf(cf, keys::node_key(fingerprint))
            .map(|v| v.is_some())
            .map_err(|e| backend("exists", StorageIndex::Nodes, e))
    }

    fn children(&self, parent: &HashSignature) -> Result<Vec<HashSignature>, StorageError> {
        let prefix = parent.as_bytes();
        let entries = self.scan_keys(StorageIndex::Edges, prefix, |key| key.starts_with(prefix))?;
        Ok(entries.iter().filter_map(|key| keys::edge_child(key)).collect())
    }

    fn fingerprints_between(
        &self,
        since: UnixTime,
        until: UnixTime,
    ) -> Result<Vec<HashSignature>, StorageError> {
        let end = keys::time_prefix(until);
        let entries = self.scan_keys(StorageIndex::Timestamps, &keys::time_prefix(since), |key| {
            key.len() >= 8 && key[..8] < end[..]
        })?;
        Ok(entries
            .iter()
            .filter_map(|key| keys::parse_timestamp_key(key).map(|(_, fp)| fp))
            .collect())
    }

    fn latest_timestamp(&self) -> Result<Option<UnixTime>, StorageError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StorageError::Closed)?;
        let cf = db
            .cf_handle(CF_TIMESTAMPS)
            .ok_or_else(|| missing_cf(StorageIndex::Timestamps))?;
        match db.iterator_cf(cf, IteratorMode::End).next() {
            None => Ok(None),
            Some(item) => {
                let (key, _) = item.map_err(|e| backend("seek", StorageIndex::Timestamps, e))?;
                keys::parse_timestamp_key(&key)
                    .map(|(time, _)| Some(time))
                    .ok_or(StorageError::Corrupt {
                        index: StorageIndex::Timestamps,
                        message: format!("key of {} bytes", key.len()),
                    })
            }
        }
    }

    fn close(&self) -> Result<(), StorageError> {
        if self.db.write().take().is_some() {
            info!("[df-02] Closed node database at {}", self.config.path);
        }
        Ok(())
    }
}
