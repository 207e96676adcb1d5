//! ---
//! tg_section: "05-decision-cache"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Tenant-scoped memoization of access decisions."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use thiserror::Error;

/// Failures surfaced by a key-value store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The store did not answer within the configured bound.
    #[error("cache store timed out after {0:?}")]
    Timeout(Duration),
    /// The store is unreachable.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    /// A value could not be encoded or decoded.
    #[error("cache value could not be (de)serialized: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Backing store for [`crate::TenantCache`]. Keys arrive already namespaced.
///
/// `put` and `forget` must be atomic with respect to concurrent readers.
pub trait KeyValueStore: Send + Sync {
    /// Value for a key, `None` on miss or expiry.
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store a value for `ttl`, indexed under each tag.
    fn put(&self, key: &str, value: Value, ttl: Duration, tags: &[String]) -> Result<(), CacheError>;

    /// Remove a key. Returns true if it was present.
    fn forget(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key stored under a tag, returning how many were dropped.
    fn forget_tag(&self, tag: &str) -> Result<usize, CacheError>;

    /// Whether a live value exists for the key.
    fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key)?.is_some())
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
    tags: Vec<String>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<String, Entry>,
    tags: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn untag(&mut self, key: &str, tags: &[String]) {
        for tag in tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.untag(key, &entry.tags);
                true
            }
            None => false,
        }
    }
}

/// Bounded in-process store with LRU eviction and per-entry expiry.
///
/// Lock acquisition is bounded by `timeout`; contention surfaces as
/// [`CacheError::Timeout`] so callers can fall back to direct computation.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    timeout: Duration,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` entries.
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                tags: HashMap::new(),
            }),
            timeout,
        }
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, CacheError> {
        self.inner
            .try_lock_for(self.timeout)
            .ok_or(CacheError::Timeout(self.timeout))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut inner = self.lock()?;
        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => {
                return Ok(Some(entry.value.clone()))
            }
            Some(_) => {}
            None => return Ok(None),
        }
        inner.remove(key);
        Ok(None)
    }

    fn put(&self, key: &str, value: Value, ttl: Duration, tags: &[String]) -> Result<(), CacheError> {
        let mut inner = self.lock()?;
        inner.remove(key);
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
            tags: tags.to_vec(),
        };
        if let Some((evicted, old)) = inner.entries.push(key.to_owned(), entry) {
            inner.untag(&evicted, &old.tags);
        }
        for tag in tags {
            inner
                .tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_owned());
        }
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock()?.remove(key))
    }

    fn forget_tag(&self, tag: &str) -> Result<usize, CacheError> {
        let mut inner = self.lock()?;
        let Some(keys) = inner.tags.remove(tag) else {
            return Ok(0);
        };
        let mut dropped = 0;
        for key in keys {
            if inner.remove(&key) {
                dropped += 1;
            }
        }
        Ok(dropped)
    }
}
