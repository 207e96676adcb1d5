//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Access resolution and policy wiring."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tiergate_cache::TenantCache;
use tiergate_catalog::{ActionId, CapabilityPath};
use tiergate_common::{InvalidationTags, TenantId};
use tiergate_logging::{tg_warn, LogContext};
use tiergate_security::{AccessMetrics, DataScope, Principal};

use crate::decision::{Decision, DenialReason};
use crate::resolver::{AccessResolver, CapabilityPrefix, MenuModule};
use crate::scope::{scope_allows, ScopedResource};

/// [`AccessResolver`] behind a [`TenantCache`].
///
/// Decisions, scopes and menus are cached per principal in the principal's
/// tenant namespace. Keys embed the catalog generation, so a hierarchy
/// refresh never serves stale entries. Every entry is tagged with the
/// principal tag and the configured invalidation tags, so a mutation can drop
/// exactly what it affects. Transient denials are never cached.
///
/// Keys also embed a tenant epoch and a principal epoch that every
/// invalidation bumps. A value computed before a mutation but written after
/// its invalidation lands under a dead key.
#[derive(Clone)]
pub struct CachedResolver {
    resolver: Arc<AccessResolver>,
    cache: TenantCache,
    tags: InvalidationTags,
    epochs: Arc<Mutex<HashMap<String, u64>>>,
    metrics: Option<AccessMetrics>,
}

impl CachedResolver {
    /// Wrap a resolver with a cache.
    pub fn new(resolver: Arc<AccessResolver>, cache: TenantCache, tags: InvalidationTags) -> Self {
        Self {
            resolver,
            cache,
            tags,
            epochs: Arc::new(Mutex::new(HashMap::new())),
            metrics: None,
        }
    }

    /// Count hits, misses and store errors on the given metrics.
    pub fn with_metrics(mut self, metrics: AccessMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Uncached resolver.
    pub fn resolver(&self) -> &AccessResolver {
        &self.resolver
    }

    /// Underlying cache.
    pub fn cache(&self) -> &TenantCache {
        &self.cache
    }

    /// Tag carried by every entry cached for a principal.
    pub fn principal_tag(principal: &Principal) -> String {
        format!("principal:{}", principal.id)
    }

    /// Cached [`AccessResolver::decide`].
    pub fn decide(&self, principal: &Principal, prefix: &CapabilityPrefix<'_>) -> Decision {
        let segments = [Some(prefix.module), prefix.submodule, prefix.component, prefix.action];
        let key = self.key("decision", principal, segments.into_iter().flatten());
        self.cached(
            principal,
            &key,
            || Some(self.resolver.decide(principal, prefix)),
            |decision| {
                !decision
                    .reason()
                    .is_some_and(|reason| reason.is_transient())
            },
        )
        .unwrap_or(Decision::Denied(DenialReason::StoreUnavailable))
    }

    /// Cached `canAccessModule`.
    pub fn can_access_module(&self, principal: &Principal, module: &str) -> bool {
        self.decide(principal, &CapabilityPrefix::module(module)).is_allowed()
    }

    /// Cached `canAccessSubModule`.
    pub fn can_access_submodule(&self, principal: &Principal, module: &str, submodule: &str) -> bool {
        self.decide(principal, &CapabilityPrefix::submodule(module, submodule))
            .is_allowed()
    }

    /// Cached `canAccessComponent`.
    pub fn can_access_component(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
    ) -> bool {
        self.decide(
            principal,
            &CapabilityPrefix::component(module, submodule, component),
        )
        .is_allowed()
    }

    /// Cached `canPerformAction`.
    pub fn can_perform_action(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
        action: &str,
    ) -> bool {
        self.decide(
            principal,
            &CapabilityPrefix::action(module, submodule, component, action),
        )
        .is_allowed()
    }

    /// Cached action decision followed by the scope test.
    pub fn decide_action_with_scope(
        &self,
        principal: &Principal,
        path: &CapabilityPath,
        resource: Option<&dyn ScopedResource>,
    ) -> Decision {
        let decision = self.decide(principal, &CapabilityPrefix::from_path(path));
        let (Decision::Allowed, Some(resource)) = (decision, resource) else {
            return decision;
        };
        match self.scope_for_path(principal, path) {
            Some(scope) if scope_allows(scope, principal, resource) => Decision::Allowed,
            _ => Decision::Denied(DenialReason::Scope),
        }
    }

    /// Cached `canPerformActionWithScope`.
    pub fn can_perform_action_with_scope(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
        action: &str,
        resource: Option<&dyn ScopedResource>,
    ) -> bool {
        let path = CapabilityPath::new(module, submodule, component, action);
        self.decide_action_with_scope(principal, &path, resource).is_allowed()
    }

    /// Cached `getUserAccessScope`.
    pub fn get_user_access_scope(&self, principal: &Principal, action: ActionId) -> Option<DataScope> {
        let path = self.resolver.catalog().snapshot().path_of(action)?;
        self.scope_for_path(principal, &path)
    }

    /// Cached widest scope for an action path.
    ///
    /// Scope lookups that hit a failing store are not cached.
    pub fn scope_for_path(&self, principal: &Principal, path: &CapabilityPath) -> Option<DataScope> {
        let segments = [&path.module, &path.submodule, &path.component, &path.action];
        let key = self.key("scope", principal, segments.into_iter().map(String::as_str));
        self.cached(
            principal,
            &key,
            || match self.resolver.grants(principal) {
                Ok(grants) if grants.super_admin => Some(Some(DataScope::All)),
                Ok(grants) => Some(grants.scope_for(path)),
                Err(_) => None,
            },
            |_| true,
        )
        .flatten()
    }

    /// Cached navigation tree; empty when the stores fail.
    pub fn accessible_modules(&self, principal: &Principal) -> Vec<MenuModule> {
        let key = self.key("menu", principal, std::iter::empty());
        self.cached(
            principal,
            &key,
            || self.resolver.accessible_modules(principal).ok(),
            |_| true,
        )
        .unwrap_or_default()
    }

    /// Drop every entry cached for a principal.
    pub fn invalidate_principal(&self, principal: &Principal) -> usize {
        let tag = Self::principal_tag(principal);
        self.bump(&tag);
        self.cache.invalidate_tag(principal.tenant.as_ref(), &tag)
    }

    /// Drop a deleted principal's entries and its epoch.
    ///
    /// The tenant epoch is bumped in the same step, so a recreated principal
    /// with the same id never reaches a key written before the deletion.
    pub fn forget_principal(&self, principal: &Principal) -> usize {
        let tag = Self::principal_tag(principal);
        {
            let mut epochs = self.epochs.lock();
            *epochs
                .entry(tenant_epoch(principal.tenant.as_ref()))
                .or_insert(0) += 1;
            epochs.remove(&tag);
        }
        self.cache.invalidate_tag(principal.tenant.as_ref(), &tag)
    }

    /// Drop every cached decision of a tenant after a grant change.
    pub fn invalidate_permissions(&self, tenant: Option<&TenantId>) -> usize {
        self.bump(&tenant_epoch(tenant));
        self.cache.invalidate_tag(tenant, &self.tags.permissions)
    }

    /// Drop every cached decision of a tenant after a plan change.
    pub fn invalidate_subscriptions(&self, tenant: Option<&TenantId>) -> usize {
        self.bump(&tenant_epoch(tenant));
        self.cache.invalidate_tag(tenant, &self.tags.subscriptions)
    }

    /// Drop every cached decision of a tenant after a hierarchy change.
    pub fn invalidate_hierarchy(&self, tenant: Option<&TenantId>) -> usize {
        self.bump(&tenant_epoch(tenant));
        self.cache.invalidate_tag(tenant, &self.tags.hierarchy)
    }

    fn bump(&self, scope: &str) {
        *self.epochs.lock().entry(scope.to_owned()).or_insert(0) += 1;
    }

    /// Segments are length-prefixed, so codes and ids containing `.` or `:`
    /// never share a key.
    fn key<'s>(
        &self,
        kind: &str,
        principal: &'s Principal,
        subject: impl Iterator<Item = &'s str>,
    ) -> String {
        let (tenant, own) = {
            let epochs = self.epochs.lock();
            let read = |scope: &str| epochs.get(scope).copied().unwrap_or(0);
            (
                read(&tenant_epoch(principal.tenant.as_ref())),
                read(&Self::principal_tag(principal)),
            )
        };
        let segments = std::iter::once(principal.id.as_str())
            .chain(subject)
            .map(|segment| format!("{}#{segment}", segment.len()))
            .collect::<Vec<_>>();
        format!(
            "{kind}:g{}:e{tenant}.{own}:{}",
            self.resolver.catalog().generation(),
            segments.join("/")
        )
    }

    /// Read-through helper. `compute` returns `None` for results that must
    /// not be cached; `cacheable` vetoes storing a computed value.
    fn cached<T, C, P>(&self, principal: &Principal, key: &str, compute: C, cacheable: P) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        C: FnOnce() -> Option<T>,
        P: FnOnce(&T) -> bool,
    {
        let tenant = principal.tenant.as_ref();
        match self.cache.lookup::<T>(tenant, key) {
            Ok(Some(value)) => {
                self.count(|metrics| metrics.inc_cache_hit());
                return Some(value);
            }
            Ok(None) => self.count(|metrics| metrics.inc_cache_miss()),
            Err(err) => {
                self.count(|metrics| metrics.inc_cache_error());
                tg_warn!(
                    context = log_context(principal),
                    "decision cache read failed, resolving directly: {err}"
                );
            }
        }
        let value = compute()?;
        if cacheable(&value) {
            let principal_tag = Self::principal_tag(principal);
            let tags = [
                principal_tag.as_str(),
                self.tags.permissions.as_str(),
                self.tags.subscriptions.as_str(),
                self.tags.hierarchy.as_str(),
            ];
            if let Err(err) = self.cache.insert(tenant, key, &value, None, &tags) {
                self.count(|metrics| metrics.inc_cache_error());
                tg_warn!(
                    context = log_context(principal),
                    "decision cache write failed: {err}"
                );
            }
        }
        Some(value)
    }

    fn count(&self, record: impl FnOnce(&AccessMetrics)) {
        if let Some(metrics) = &self.metrics {
            record(metrics);
        }
    }
}

fn tenant_epoch(tenant: Option<&TenantId>) -> String {
    tenant.map_or_else(|| "global".to_string(), |tenant| format!("tenant:{tenant}"))
}

fn log_context(principal: &Principal) -> LogContext<'_> {
    LogContext::new()
        .with_tenant(principal.tenant.as_ref().map_or("", TenantId::as_str))
        .with_principal(principal.id.as_str())
}

#[cfg(test)]
mod tests {
    use tiergate_common::AppConfig;

    use crate::{Engine, PolicyBundle};

    const BUNDLE: &str = r#"
[[modules]]
code = "core"
name = "Core"
requires_subscription = false

[[modules.submodules]]
code = "users"
name = "Users"

[[modules.submodules.components]]
code = "profile"
name = "Profile"

[[modules.submodules.components.actions]]
code = "view"

[[roles]]
id = "viewer"
name = "Viewer"

[[roles.assignments]]
action = "core.users.profile.view"

[[principals]]
id = "alice"
roles = ["viewer"]
"#;

    #[test]
    fn forgetting_a_principal_releases_its_epoch() {
        let bundle: PolicyBundle = toml::from_str(BUNDLE).unwrap();
        let engine = Engine::from_bundle(&bundle, AppConfig::default()).unwrap();
        let resolver = engine.resolver();
        let alice = engine.principal("alice").unwrap();

        assert!(resolver.can_access_module(&alice, "core"));
        resolver.invalidate_principal(&alice);
        assert!(resolver.epochs.lock().contains_key("principal:alice"));
        let before = resolver.key("decision", &alice, ["core"].into_iter());

        resolver.forget_principal(&alice);
        assert!(!resolver.epochs.lock().contains_key("principal:alice"));
        assert_ne!(resolver.key("decision", &alice, ["core"].into_iter()), before);
        assert!(resolver.can_access_module(&alice, "core"));
    }
}
