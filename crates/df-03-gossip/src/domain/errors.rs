//! Gossip error types.

use thiserror::Error;

/// Malformed frames and payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("payload of {len} bytes does not fit a u16 length field")]
    PayloadTooLarge { len: usize },

    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("payload must be {expected} bytes, got {actual}")]
    WrongPayloadLength { expected: usize, actual: usize },

    #[error("sync timestamp is not a JSON integer: {0}")]
    InvalidTimestamp(String),

    #[error("sync response is not a fingerprint list: {0}")]
    InvalidSyncResponse(String),
}

/// Failures of an exchange with a peer.
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("failed to open stream to {peer}: {message}")]
    StreamUnavailable { peer: String, message: String },

    #[error("peer {0} is not connected")]
    UnknownPeer(String),

    #[error("stream I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("response exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("peer sent an empty response")]
    EmptyResponse,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to persist peer addresses: {0}")]
    Persistence(String),
}
