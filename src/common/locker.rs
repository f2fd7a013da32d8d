//! Per-key read/write lock registry
//!
//! Locks are keyed by an arbitrary string (a volume name in the router, a host
//! name inside the SAN attach path). A lock is created the first time its key
//! is seen and then kept for the lifetime of the registry, so the map grows
//! with the number of distinct keys.
//!
//! Guards are owned and release the lock when dropped.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Registry of lazily created per-key locks
#[derive(Debug, Default)]
pub struct Locker {
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl Locker {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<RwLock<()>> {
        if let Some(lock) = self.locks.get(key) {
            return lock.clone();
        }
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Shared lock on `key`; blocks while a writer holds it.
    pub async fn read_lock(&self, key: &str) -> OwnedRwLockReadGuard<()> {
        self.lock_for(key).read_owned().await
    }

    /// Exclusive lock on `key`.
    pub async fn write_lock(&self, key: &str) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(key).write_owned().await
    }

    /// Number of keys that have ever been locked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
