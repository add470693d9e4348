//! # Outbound Ports
//!
//! Interfaces the storage service needs from its host.
//!
//! Production: `RocksDbNodeDatabase` (feature `rocksdb`)
//! Testing: `InMemoryNodeDatabase`

use df_01_content_model::Node;
use shared_types::{HashSignature, UnixTime};
use std::sync::Arc;

use crate::domain::errors::StorageError;

/// Persistent store shaped as three key-value indexes.
///
/// The shape is the contract: any backend that can hold the node, edge and
/// timestamp indexes described in [`crate::keys`] is a drop-in replacement.
/// No cross-index transaction is required or assumed.
pub trait NodeDatabase: Send + Sync {
    /// Write a serialized node under its fingerprint.
    fn put_node(&self, fingerprint: &HashSignature, bytes: &[u8]) -> Result<(), StorageError>;

    /// Record `child` under `parent` in the edge index.
    fn put_edge(&self, parent: &HashSignature, child: &HashSignature) -> Result<(), StorageError>;

    /// Record `fingerprint` at `timestamp` in the timestamp index.
    fn put_timestamp(
        &self,
        timestamp: UnixTime,
        fingerprint: &HashSignature,
    ) -> Result<(), StorageError>;

    fn get_node(&self, fingerprint: &HashSignature) -> Result<Option<Vec<u8>>, StorageError>;

    fn has_node(&self, fingerprint: &HashSignature) -> Result<bool, StorageError>;

    /// Children of `parent` in key order.
    fn children(&self, parent: &HashSignature) -> Result<Vec<HashSignature>, StorageError>;

    /// Fingerprints with `since <= timestamp < until`, oldest first.
    fn fingerprints_between(
        &self,
        since: UnixTime,
        until: UnixTime,
    ) -> Result<Vec<HashSignature>, StorageError>;

    /// Time of the last entry in the timestamp index.
    fn latest_timestamp(&self) -> Result<Option<UnixTime>, StorageError>;

    /// Release the backend. Later calls fail with [`StorageError::Closed`].
    fn close(&self) -> Result<(), StorageError>;
}

/// Receiver of "new node available" events.
///
/// Called synchronously on the publishing path; implementations should hand
/// the node off rather than do slow work inline.
pub trait NodeListener: Send + Sync {
    fn on_new_node(&self, node: &Arc<Node>);
}
