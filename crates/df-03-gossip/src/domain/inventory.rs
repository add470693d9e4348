//! # Inventory Deduplicator
//!
//! One lock per fingerprint so that concurrent announcements of the same
//! content from many peers lead to at most one fetch in flight, and no
//! further fetches once one has succeeded.
//!
//! ```text
//! announce(F) ──→ get_lock(F) ──→ lock.run_until_success(fetch)
//!                   │                    │
//!            read-mostly table    per-fingerprint mutex
//! ```
//!
//! Locks are removed when their content is stored. A lock whose fetch
//! chains keep failing is evicted after a configurable number of failures;
//! the fingerprint is then left to the periodic sync path.

use parking_lot::RwLock;
use shared_types::HashSignature;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct LockState {
    success: bool,
    failures: u32,
}

/// Outcome of [`InventoryLock::run_until_success`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// The action ran; `failures` counts every failed run so far.
    Ran { success: bool, failures: u32 },
    /// A previous run succeeded; the action was skipped.
    AlreadySucceeded,
}

#[derive(Debug, Default)]
pub struct InventoryLock {
    state: Mutex<LockState>,
}

impl InventoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` under the lock unless an earlier run succeeded.
    ///
    /// Concurrent callers serialize here; the mutex is held across the
    /// action's await points.
    pub async fn run_until_success<F, Fut>(&self, action: F) -> LockOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut state = self.state.lock().await;
        if state.success {
            return LockOutcome::AlreadySucceeded;
        }
        state.success = action().await;
        if !state.success {
            state.failures += 1;
        }
        LockOutcome::Ran {
            success: state.success,
            failures: state.failures,
        }
    }

    pub async fn has_succeeded(&self) -> bool {
        self.state.lock().await.success
    }
}

/// Table of per-fingerprint locks.
#[derive(Default)]
pub struct InventoryHandler {
    locks: RwLock<HashMap<HashSignature, Arc<InventoryLock>>>,
}

impl InventoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing lock for `fingerprint`, or a new one.
    pub fn get_lock(&self, fingerprint: HashSignature) -> Arc<InventoryLock> {
        if let Some(lock) = self.locks.read().get(&fingerprint) {
            return lock.clone();
        }
        self.locks
            .write()
            .entry(fingerprint)
            .or_insert_with(|| Arc::new(InventoryLock::new()))
            .clone()
    }

    /// Drop the lock once its content is stored.
    pub fn delete_lock(&self, fingerprint: &HashSignature) {
        self.locks.write().remove(fingerprint);
    }

    pub fn contains(&self, fingerprint: &HashSignature) -> bool {
        self.locks.read().contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}
