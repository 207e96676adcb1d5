//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Access resolution and policy wiring."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use prometheus::Registry;
use tiergate_cache::TenantCache;
use tiergate_catalog::{HierarchyDefinition, ModuleDefinition, PlanCatalog, SharedCatalog};
use tiergate_common::{AppConfig, PrincipalId};
use tiergate_security::{
    AccessMetrics, AssignmentSource, AuditLog, Principal, PrincipalDirectory, PrincipalSource,
    ProtectedEntityGuard, RoleStore,
};
use tracing::info;

use crate::admin::AccessAdministrator;
use crate::bundle::PolicyBundle;
use crate::cached::CachedResolver;
use crate::resolver::AccessResolver;

/// Fully wired engine backed by in-memory stores.
#[derive(Clone)]
pub struct Engine {
    config: Arc<AppConfig>,
    catalog: SharedCatalog,
    plans: Arc<PlanCatalog>,
    roles: Arc<RoleStore>,
    directory: Arc<PrincipalDirectory>,
    resolver: Arc<CachedResolver>,
    guard: ProtectedEntityGuard,
    admin: AccessAdministrator,
    metrics: Option<AccessMetrics>,
}

impl Engine {
    /// Seed the stores from `bundle` and wire every component.
    pub fn from_bundle(bundle: &PolicyBundle, config: AppConfig) -> Result<Self> {
        config.validate()?;
        let catalog = SharedCatalog::from_definition(&bundle.hierarchy())
            .context("policy bundle hierarchy is invalid")?;

        let plans = Arc::new(PlanCatalog::new());
        for plan in &bundle.plans {
            plans
                .upsert_plan(plan.clone())
                .with_context(|| format!("invalid plan '{}'", plan.code))?;
        }
        for subscription in &bundle.subscriptions {
            plans.subscribe(subscription.clone()).with_context(|| {
                format!(
                    "invalid subscription of tenant '{}' to '{}'",
                    subscription.tenant, subscription.plan
                )
            })?;
        }

        let roles = Arc::new(RoleStore::new());
        for entry in &bundle.roles {
            roles.upsert_role(entry.role.clone().with_access_config(&config.access));
            roles
                .set_assignments(
                    &entry.role.id,
                    entry.assignments
                        .iter()
                        .map(|grant| (grant.action.clone(), grant.scope)),
                )
                .with_context(|| format!("invalid grants for role '{}'", entry.role.id))?;
        }

        let directory = Arc::new(PrincipalDirectory::new());
        for entry in &bundle.principals {
            directory.upsert(entry.principal.clone());
            for role in &entry.roles {
                roles.grant_role(&entry.principal.id, role).with_context(|| {
                    format!("principal '{}' references missing role", entry.principal.id)
                })?;
            }
        }

        let metrics = if config.metrics.enabled {
            Some(AccessMetrics::new(Arc::new(Registry::new()))?)
        } else {
            None
        };

        let assignments: Arc<dyn AssignmentSource> = roles.clone();
        let principals: Arc<dyn PrincipalSource> = directory.clone();
        let mut resolver =
            AccessResolver::new(catalog.clone(), plans.clone(), assignments.clone(), &config.access);
        if let Some(metrics) = &metrics {
            resolver = resolver.with_metrics(metrics.clone());
        }
        let cache = TenantCache::in_memory(&config.cache, config.access.multi_tenant);
        let mut cached = CachedResolver::new(
            Arc::new(resolver),
            cache,
            config.cache.invalidation_tags.clone(),
        );
        if let Some(metrics) = &metrics {
            cached = cached.with_metrics(metrics.clone());
        }
        let resolver = Arc::new(cached);

        let guard = ProtectedEntityGuard::new(
            config.access.protected_roles.clone(),
            assignments,
            principals,
        );
        let mut admin = AccessAdministrator::new(
            roles.clone(),
            directory.clone(),
            plans.clone(),
            guard.clone(),
            resolver.clone(),
            &config.access,
        )
        .context("invalid administrative capability configuration")?;
        if let Some(metrics) = &metrics {
            admin = admin.with_metrics(metrics.clone());
        }

        info!(
            modules = bundle.modules.len(),
            roles = bundle.roles.len(),
            principals = bundle.principals.len(),
            "engine wired from policy bundle"
        );

        Ok(Self {
            config: Arc::new(config),
            catalog,
            plans,
            roles,
            directory,
            resolver,
            guard,
            admin,
            metrics,
        })
    }

    /// Load the bundle named by `config.bundle` and wire the engine.
    pub fn load(config: AppConfig) -> Result<Self> {
        let path = config
            .bundle
            .clone()
            .ok_or_else(|| anyhow!("configuration does not name a policy bundle"))?;
        let bundle = PolicyBundle::from_path(&path)?;
        Self::from_bundle(&bundle, config)
    }

    /// Append every administrative mutation to the audit log at `path`.
    pub fn with_audit(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let audit = AuditLog::open(path.as_ref())
            .with_context(|| format!("failed to open audit log {}", path.as_ref().display()))?;
        self.admin = self.admin.with_audit(Arc::new(audit));
        Ok(self)
    }

    /// Replace the hierarchy. Cached entries keyed on the old generation are
    /// no longer reachable.
    pub fn refresh_hierarchy(&self, modules: Vec<ModuleDefinition>) -> Result<u64> {
        let generation = self
            .catalog
            .refresh(&HierarchyDefinition { modules })
            .context("refreshed hierarchy is invalid")?;
        info!(generation, "hierarchy refreshed");
        Ok(generation)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    pub fn plans(&self) -> &Arc<PlanCatalog> {
        &self.plans
    }

    pub fn roles(&self) -> &Arc<RoleStore> {
        &self.roles
    }

    pub fn directory(&self) -> &Arc<PrincipalDirectory> {
        &self.directory
    }

    /// Cached resolver; the read path for callers.
    pub fn resolver(&self) -> &CachedResolver {
        &self.resolver
    }

    pub fn guard(&self) -> &ProtectedEntityGuard {
        &self.guard
    }

    /// Mutation boundary.
    pub fn admin(&self) -> &AccessAdministrator {
        &self.admin
    }

    pub fn metrics(&self) -> Option<&AccessMetrics> {
        self.metrics.as_ref()
    }

    /// Look up a principal by id.
    pub fn principal(&self, id: &str) -> Result<Principal> {
        self.directory
            .get(&PrincipalId::from(id))
            .ok_or_else(|| anyhow!("unknown principal '{id}'"))
    }
}
