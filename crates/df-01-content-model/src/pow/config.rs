//! Proof-of-work configuration.

/// Difficulty used when the configured value is out of range.
pub const STANDARD_DIFFICULTY: u32 = 24;

/// Lowest difficulty a producer may be configured with.
pub const MIN_CONFIGURABLE_DIFFICULTY: u32 = 16;

/// Highest difficulty a producer may be configured with.
pub const MAX_CONFIGURABLE_DIFFICULTY: u32 = 28;

/// Producer-side proof-of-work settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofOfWorkConfig {
    /// Requested difficulty in bits (leading hex characters × 4).
    pub difficulty: i64,
}

impl Default for ProofOfWorkConfig {
    fn default() -> Self {
        Self {
            difficulty: STANDARD_DIFFICULTY as i64,
        }
    }
}

impl ProofOfWorkConfig {
    pub fn with_difficulty(difficulty: i64) -> Self {
        Self { difficulty }
    }

    /// Difficulty actually used for computation.
    pub fn effective_difficulty(&self) -> u32 {
        let range = MIN_CONFIGURABLE_DIFFICULTY as i64..=MAX_CONFIGURABLE_DIFFICULTY as i64;
        if range.contains(&self.difficulty) {
            self.difficulty as u32
        } else {
            STANDARD_DIFFICULTY
        }
    }
}
