use serde::{Deserialize, Serialize};
use shared_types::{unix_now, HashSignature, UnixTime};

use crate::errors::ContentError;

/// Indicator given to top-level topics created through the forum facade.
pub const TOPIC_INDICATOR: i8 = -1;

/// User-visible part of a node.
///
/// Field order is fixed by the struct definition, so the JSON form is
/// deterministic and can be hashed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataObject {
    /// Zero for top-level items.
    pub parent: HashSignature,
    /// Seconds since epoch, set once at creation.
    pub timestamp: UnixTime,
    pub topic: String,
    /// Application-defined classification; not interpreted here.
    pub indicator: i8,
    pub content: String,
}

impl DataObject {
    /// Stamp a new data object with the current time.
    pub fn new(topic: &str, content: &str, indicator: i8, parent: HashSignature) -> Self {
        Self::with_timestamp(topic, content, indicator, parent, unix_now())
    }

    pub fn with_timestamp(
        topic: &str,
        content: &str,
        indicator: i8,
        parent: HashSignature,
        timestamp: UnixTime,
    ) -> Self {
        Self {
            parent,
            timestamp,
            topic: topic.to_string(),
            indicator,
            content: content.to_string(),
        }
    }

    /// Canonical byte form used for hashing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContentError> {
        serde_json::to_vec(self).map_err(|e| ContentError::Serialization(e.to_string()))
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_zero()
    }
}
