use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};
use shared_types::{HashSignature, HASH_SIGNATURE_LEN};

use crate::errors::{ProofOfWorkError, VerificationError};
use crate::pow::{self, ProofOfWorkEngine};

/// `sha224(data ++ proof_of_work)`.
pub fn create_fingerprint(data: &[u8], proof_of_work: &str) -> HashSignature {
    let mut hasher = Sha224::new();
    hasher.update(data);
    hasher.update(proof_of_work.as_bytes());
    let mut fingerprint = [0u8; HASH_SIGNATURE_LEN];
    fingerprint.copy_from_slice(&hasher.finalize());
    HashSignature::new(fingerprint)
}

/// Fingerprint plus the proof-of-work header it was derived from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityObject {
    pub fingerprint: HashSignature,
    pub proof_of_work: String,
}

impl SecurityObject {
    /// Stamp `data` and fingerprint the result. Blocks for the whole search.
    pub fn generate(data: &[u8], engine: &ProofOfWorkEngine) -> Result<Self, ProofOfWorkError> {
        let proof_of_work = engine.stamp(data)?;
        Ok(Self {
            fingerprint: create_fingerprint(data, &proof_of_work),
            proof_of_work,
        })
    }

    /// Check both the fingerprint and the proof-of-work against `data`.
    pub fn verify(&self, data: &[u8], minimum_difficulty: u32) -> Result<(), VerificationError> {
        if create_fingerprint(data, &self.proof_of_work) != self.fingerprint {
            return Err(VerificationError::FingerprintMismatch);
        }
        pow::verify_with_minimum(&self.proof_of_work, data, minimum_difficulty)?;
        Ok(())
    }
}
