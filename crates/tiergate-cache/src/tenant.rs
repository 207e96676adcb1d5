//! ---
//! tg_section: "05-decision-cache"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Tenant-scoped memoization of access decisions."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tiergate_common::{CacheConfig, TenantId};
use tiergate_logging::{tg_debug, tg_warn, LogContext};

use crate::store::{CacheError, KeyValueStore, MemoryStore};

const GLOBAL_NAMESPACE: &str = "global";

/// Memoization layer that namespaces every key by tenant.
///
/// With multi-tenant mode on, keys become `tenant:{id}:{key}`; otherwise (and
/// for callers without a tenant) they become `global:{key}`. Tags are
/// namespaced the same way. Store failures never reach the caller: reads
/// degrade to the default or to direct computation, writes are dropped.
#[derive(Clone)]
pub struct TenantCache {
    store: Arc<dyn KeyValueStore>,
    enabled: bool,
    multi_tenant: bool,
    default_ttl: Duration,
}

impl TenantCache {
    /// Wrap an existing store.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: &CacheConfig,
        multi_tenant: bool,
    ) -> Self {
        Self {
            store,
            enabled: config.enabled,
            multi_tenant,
            default_ttl: config.default_ttl,
        }
    }

    /// Build a cache over a fresh [`MemoryStore`] sized from configuration.
    pub fn in_memory(config: &CacheConfig, multi_tenant: bool) -> Self {
        let store = MemoryStore::new(config.capacity, config.store_timeout);
        Self::new(Arc::new(store), config, multi_tenant)
    }

    /// Whether memoization is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// TTL applied when callers pass `None`.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fully-qualified store key for a caller key.
    pub fn namespaced_key(&self, tenant: Option<&TenantId>, key: &str) -> String {
        match tenant {
            Some(tenant) if self.multi_tenant => format!("tenant:{tenant}:{key}"),
            _ => format!("{GLOBAL_NAMESPACE}:{key}"),
        }
    }

    /// Raw lookup that reports store failures instead of hiding them.
    pub fn lookup<T: DeserializeOwned>(
        &self,
        tenant: Option<&TenantId>,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        if !self.enabled {
            return Ok(None);
        }
        match self.store.get(&self.namespaced_key(tenant, key))? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Raw tagged write that reports store failures.
    pub fn insert<T: Serialize>(
        &self,
        tenant: Option<&TenantId>,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        tags: &[&str],
    ) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        let tags = tags
            .iter()
            .map(|tag| self.namespaced_key(tenant, tag))
            .collect::<Vec<_>>();
        self.store.put(
            &self.namespaced_key(tenant, key),
            serde_json::to_value(value)?,
            ttl.unwrap_or(self.default_ttl),
            &tags,
        )
    }

    /// Store a value; `None` uses the default TTL.
    pub fn put<T: Serialize>(
        &self,
        tenant: Option<&TenantId>,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) {
        if let Err(err) = self.insert(tenant, key, value, ttl, &[]) {
            degrade(tenant, key, "put", &err);
        }
    }

    /// Cached value or `default` on miss, decode failure or store failure.
    pub fn get<T: DeserializeOwned>(&self, tenant: Option<&TenantId>, key: &str, default: T) -> T {
        match self.lookup(tenant, key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                degrade(tenant, key, "get", &err);
                default
            }
        }
    }

    /// Cached value, or compute it, cache it and return it.
    pub fn remember<T, F>(
        &self,
        tenant: Option<&TenantId>,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.remember_tagged(tenant, key, ttl, &[], compute)
    }

    /// [`TenantCache::remember`] that also indexes the entry under `tags`.
    pub fn remember_tagged<T, F>(
        &self,
        tenant: Option<&TenantId>,
        key: &str,
        ttl: Option<Duration>,
        tags: &[&str],
        compute: F,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.lookup(tenant, key) {
            Ok(Some(value)) => return value,
            Ok(None) => {}
            Err(err) => degrade(tenant, key, "get", &err),
        }
        let value = compute();
        if let Err(err) = self.insert(tenant, key, &value, ttl, tags) {
            degrade(tenant, key, "put", &err);
        }
        value
    }

    /// Drop one key. Returns false on miss or store failure.
    pub fn forget(&self, tenant: Option<&TenantId>, key: &str) -> bool {
        match self.store.forget(&self.namespaced_key(tenant, key)) {
            Ok(removed) => removed,
            Err(err) => {
                degrade(tenant, key, "forget", &err);
                false
            }
        }
    }

    /// Whether a live value exists. Store failures read as absent.
    pub fn has(&self, tenant: Option<&TenantId>, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match self.store.has(&self.namespaced_key(tenant, key)) {
            Ok(present) => present,
            Err(err) => {
                degrade(tenant, key, "has", &err);
                false
            }
        }
    }

    /// Drop every entry indexed under `tag` in the tenant's namespace.
    pub fn invalidate_tag(&self, tenant: Option<&TenantId>, tag: &str) -> usize {
        match self.store.forget_tag(&self.namespaced_key(tenant, tag)) {
            Ok(dropped) => {
                let ctx = LogContext::new().with_tenant(tenant.map_or("", TenantId::as_str));
                tg_debug!(context = ctx, "invalidated {dropped} cache entries tagged '{tag}'");
                dropped
            }
            Err(err) => {
                degrade(tenant, tag, "invalidate", &err);
                0
            }
        }
    }
}

fn degrade(tenant: Option<&TenantId>, key: &str, operation: &str, err: &CacheError) {
    let ctx = LogContext::new().with_tenant(tenant.map_or("", TenantId::as_str));
    tg_warn!(
        context = ctx,
        "cache {operation} for '{key}' failed, continuing uncached: {err}"
    );
}
