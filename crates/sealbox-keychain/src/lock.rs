//! Namespace-scoped mutual exclusion.
//!
//! Every keychain operation holds its namespace's lock for its whole
//! duration (key acquisition, AEAD, encoding and batch commit), which
//! linearises operations on that namespace. Keychains created for the same
//! identifier through one [`NamespaceLocks`] registry share a single lock;
//! distinct namespaces never contend.
//!
//! The registry is backed by [`DashMap`] so lookups for different
//! namespaces do not serialise on a global lock.

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;

use crate::error::{KeychainError, Result};

/// Lock guarding one namespace.
#[derive(Debug, Clone, Default)]
pub struct NamespaceLock {
    inner: Arc<Mutex<()>>,
}

impl NamespaceLock {
    /// Block until the namespace is free and hold it until the guard drops.
    pub fn acquire(&self) -> Result<MutexGuard<'_, ()>> {
        self.inner
            .lock()
            .map_err(|e| KeychainError::Internal(format!("namespace lock poisoned: {e}")))
    }

    /// Whether two handles guard the same namespace.
    pub fn same_as(&self, other: &NamespaceLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Registry handing out one [`NamespaceLock`] per identifier.
#[derive(Debug, Clone, Default)]
pub struct NamespaceLocks {
    locks: Arc<DashMap<String, NamespaceLock>>,
}

impl NamespaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the lock for `id`, creating it on first use.
    pub fn lock_for(&self, id: &str) -> NamespaceLock {
        self.locks.entry(id.to_string()).or_default().clone()
    }

    /// Number of namespaces with a registered lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
