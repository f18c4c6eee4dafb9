//! # Session Locking
//!
//! All mutations to one issuance session must be serialized per session id.
//! `KeyedLock` provides session-scoped mutual exclusion: concurrent credential
//! requests against the same session queue behind one another, while requests
//! for different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

/// A map of named asynchronous mutexes, created on first use.
#[derive(Debug, Default)]
pub struct KeyedLock {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLock {
    /// Acquire the lock for `key`, waiting until any current holder releases
    /// it. The guard releases the lock when dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        entry.lock_owned().await
    }
}
