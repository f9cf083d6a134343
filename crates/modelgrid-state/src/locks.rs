//! Per-key write serialization.
//!
//! The store itself serializes individual transactions, but a domain
//! operation is often read-check-write. `KeyLocks` hands out one mutex
//! per key so such sequences on the same key cannot interleave, while
//! operations on different keys proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A registry of per-key mutexes, shared across clones.
#[derive(Clone, Default)]
pub struct KeyLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the mutex for a key. Callers hold the returned
    /// lock for the duration of their read-check-write sequence:
    ///
    /// ```ignore
    /// let lock = locks.acquire("dep-1");
    /// let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    /// // read, check, write
    /// ```
    pub fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_string()).or_default().clone()
    }
}
