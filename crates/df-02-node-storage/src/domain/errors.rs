//! # Storage Errors

use std::fmt;
use thiserror::Error;

/// Failure of a single backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend reported an I/O or engine error.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// The store could not be opened at startup.
    #[error("failed to open store at {path}: {message}")]
    Open { path: String, message: String },

    /// A stored value could not be decoded.
    #[error("corrupt entry in {index} index: {message}")]
    Corrupt { index: StorageIndex, message: String },

    /// The store was closed by teardown.
    #[error("store is closed")]
    Closed,
}

/// One of the three persistent indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageIndex {
    Nodes,
    Edges,
    Timestamps,
}

impl StorageIndex {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Edges => "edges",
            Self::Timestamps => "timestamps",
        }
    }
}

impl fmt::Display for StorageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of writing one node to every index.
///
/// Writes are attempted independently; a partial write leaves the indexes
/// inconsistent and shows up here with the failing index named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReport {
    pub node: Result<(), StorageError>,
    pub edge: Result<(), StorageError>,
    pub timestamp: Result<(), StorageError>,
}

impl StoreReport {
    pub fn ok() -> Self {
        Self {
            node: Ok(()),
            edge: Ok(()),
            timestamp: Ok(()),
        }
    }

    /// All three writes succeeded.
    pub fn is_complete(&self) -> bool {
        self.node.is_ok() && self.edge.is_ok() && self.timestamp.is_ok()
    }

    pub fn failures(&self) -> Vec<(StorageIndex, &StorageError)> {
        [
            (StorageIndex::Nodes, &self.node),
            (StorageIndex::Edges, &self.edge),
            (StorageIndex::Timestamps, &self.timestamp),
        ]
        .into_iter()
        .filter_map(|(index, result)| result.as_ref().err().map(|e| (index, e)))
        .collect()
    }
}
