//! # Wire Protocol Codec
//!
//! Every exchange starts with one frame:
//!
//! ```text
//! ┌────────────┬──────────────────────┬───────────────────────┐
//! │ action (1) │ payload length (2,BE)│ payload (length bytes)│
//! └────────────┴──────────────────────┴───────────────────────┘
//! ```
//!
//! | Action           | Byte | Payload               | Response                     |
//! |------------------|------|-----------------------|------------------------------|
//! | InvalidMessage   | 0    | none                  | terminal                     |
//! | SyncRequest      | 1    | JSON unix seconds     | JSON list of fingerprints    |
//! | InventoryMessage | 2    | 28-byte fingerprint   | none                         |
//! | DataRequest      | 3    | 28-byte fingerprint   | node bytes or `[0]`          |
//!
//! Responses are unframed: the responder writes the body and closes the
//! stream, and the requester reads to end of stream.

use shared_types::{HashSignature, UnixTime, HASH_SIGNATURE_LEN};
use std::fmt;

use super::errors::ProtocolError;

/// Action byte plus two length bytes.
pub const HEADER_LEN: usize = 3;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolAction {
    InvalidMessage = 0,
    SyncRequest = 1,
    InventoryMessage = 2,
    DataRequest = 3,
}

impl ProtocolAction {
    /// Out-of-range bytes decode as `InvalidMessage`.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::SyncRequest,
            2 => Self::InventoryMessage,
            3 => Self::DataRequest,
            _ => Self::InvalidMessage,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ProtocolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidMessage => "InvalidMessage",
            Self::SyncRequest => "SyncRequest",
            Self::InventoryMessage => "InventoryMessage",
            Self::DataRequest => "DataRequest",
        };
        f.write_str(name)
    }
}

/// Decoded frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub action: ProtocolAction,
    pub payload_len: u16,
}

impl FrameHeader {
    pub fn parse(bytes: [u8; HEADER_LEN]) -> Self {
        Self {
            action: ProtocolAction::from_byte(bytes[0]),
            payload_len: u16::from_be_bytes([bytes[1], bytes[2]]),
        }
    }

    /// False for `InvalidMessage` and for a zero-length payload, which
    /// every other kind requires.
    pub fn is_valid(&self) -> bool {
        self.action != ProtocolAction::InvalidMessage && self.payload_len > 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub action: ProtocolAction,
    pub payload: Vec<u8>,
}

/// Build a frame. Fails if the payload does not fit the length field.
pub fn encode_frame(action: ProtocolAction, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len = u16::try_from(payload.len())
        .map_err(|_| ProtocolError::PayloadTooLarge { len: payload.len() })?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(action.as_byte());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode a complete frame.
///
/// An out-of-range action byte or an empty payload yields an
/// `InvalidMessage` frame; only a short buffer is an error.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }
    let header = FrameHeader::parse([bytes[0], bytes[1], bytes[2]]);
    let end = HEADER_LEN + header.payload_len as usize;
    if bytes.len() < end {
        return Err(ProtocolError::Truncated {
            expected: end,
            actual: bytes.len(),
        });
    }

    let action = if header.is_valid() {
        header.action
    } else {
        ProtocolAction::InvalidMessage
    };
    Ok(Frame {
        action,
        payload: bytes[HEADER_LEN..end].to_vec(),
    })
}

/// The single-byte terminal reply.
pub fn invalid_message() -> [u8; 1] {
    [ProtocolAction::InvalidMessage.as_byte()]
}

fn fingerprint_frame(action: ProtocolAction, fingerprint: &HashSignature) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + HASH_SIGNATURE_LEN);
    frame.push(action.as_byte());
    frame.extend_from_slice(&(HASH_SIGNATURE_LEN as u16).to_be_bytes());
    frame.extend_from_slice(fingerprint.as_bytes());
    frame
}

pub fn build_inventory_message(fingerprint: &HashSignature) -> Vec<u8> {
    fingerprint_frame(ProtocolAction::InventoryMessage, fingerprint)
}

pub fn build_data_request(fingerprint: &HashSignature) -> Vec<u8> {
    fingerprint_frame(ProtocolAction::DataRequest, fingerprint)
}

/// Sync request carrying `since` as JSON-encoded unix seconds.
pub fn build_sync_request(since: UnixTime) -> Vec<u8> {
    let payload = since.to_string();
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(ProtocolAction::SyncRequest.as_byte());
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame
}

pub fn parse_hash_signature(payload: &[u8]) -> Result<HashSignature, ProtocolError> {
    HashSignature::from_slice(payload).map_err(|_| ProtocolError::WrongPayloadLength {
        expected: HASH_SIGNATURE_LEN,
        actual: payload.len(),
    })
}

pub fn parse_sync_timestamp(payload: &[u8]) -> Result<UnixTime, ProtocolError> {
    serde_json::from_slice(payload).map_err(|e| ProtocolError::InvalidTimestamp(e.to_string()))
}

pub fn encode_sync_response(fingerprints: &[HashSignature]) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(fingerprints).map_err(|e| ProtocolError::InvalidSyncResponse(e.to_string()))
}

pub fn decode_sync_response(body: &[u8]) -> Result<Vec<HashSignature>, ProtocolError> {
    serde_json::from_slice(body).map_err(|e| ProtocolError::InvalidSyncResponse(e.to_string()))
}
