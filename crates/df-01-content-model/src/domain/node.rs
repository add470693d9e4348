use serde::{Deserialize, Serialize};
use shared_types::{HashSignature, UnixTime};
use tracing::debug;

use super::data_object::DataObject;
use super::security_object::SecurityObject;
use crate::errors::{ContentError, VerificationError};
use crate::pow::ProofOfWorkEngine;

/// The unit of storage, transmission and verification.
///
/// Immutable once built: either created locally through [`Node::create`]
/// or decoded from peer bytes with [`Node::from_bytes`] and then verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "SecObj")]
    security: SecurityObject,
    #[serde(rename = "DatObj")]
    data: DataObject,
}

impl Node {
    /// Build and stamp a new node.
    ///
    /// Runs the proof-of-work search synchronously. Fails without producing
    /// a node when the search gives up.
    pub fn create(
        topic: &str,
        detail: &str,
        indicator: i8,
        parent: HashSignature,
        engine: &ProofOfWorkEngine,
    ) -> Result<Self, ContentError> {
        Self::stamp(DataObject::new(topic, detail, indicator, parent), engine)
    }

    /// Stamp an already-built data object.
    pub fn stamp(data: DataObject, engine: &ProofOfWorkEngine) -> Result<Self, ContentError> {
        let bytes = data.to_bytes()?;
        let security = SecurityObject::generate(&bytes, engine)?;
        debug!(
            fingerprint = %security.fingerprint,
            difficulty = engine.difficulty(),
            "node stamped"
        );
        Ok(Self { security, data })
    }

    /// Pair parts without checking them. Use [`Node::verify`] before trusting
    /// the result.
    pub fn assemble(security: SecurityObject, data: DataObject) -> Self {
        Self { security, data }
    }

    /// True when fingerprint and proof-of-work both hold.
    pub fn verify(&self) -> bool {
        self.verify_detailed().is_ok()
    }

    pub fn verify_detailed(&self) -> Result<(), VerificationError> {
        self.verify_with_minimum(0)
    }

    /// Verify, rejecting proofs declared below `minimum_difficulty`.
    pub fn verify_with_minimum(&self, minimum_difficulty: u32) -> Result<(), VerificationError> {
        let bytes = self
            .data
            .to_bytes()
            .map_err(|e| VerificationError::Serialization(e.to_string()))?;
        self.security.verify(&bytes, minimum_difficulty)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ContentError> {
        serde_json::to_vec(self).map_err(|e| ContentError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContentError> {
        serde_json::from_slice(bytes).map_err(|e| ContentError::Malformed(e.to_string()))
    }

    pub fn fingerprint(&self) -> HashSignature {
        self.security.fingerprint
    }

    pub fn proof_of_work(&self) -> &str {
        &self.security.proof_of_work
    }

    pub fn parent(&self) -> HashSignature {
        self.data.parent
    }

    pub fn timestamp(&self) -> UnixTime {
        self.data.timestamp
    }

    pub fn topic(&self) -> &str {
        &self.data.topic
    }

    pub fn content(&self) -> &str {
        &self.data.content
    }

    pub fn indicator(&self) -> i8 {
        self.data.indicator
    }

    pub fn security_object(&self) -> &SecurityObject {
        &self.security
    }

    pub fn data_object(&self) -> &DataObject {
        &self.data
    }
}
