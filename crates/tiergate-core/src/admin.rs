//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Access resolution and policy wiring."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
//! Mutation boundary for roles, memberships, principals and subscriptions.
//!
//! Each mutation runs the protected-entity guard first, then checks the
//! actor against the configured admin capability, applies the change, drops
//! the affected cache entries and appends an audit entry.
//!
//! Mutations are serialized: the guard's holder counts stay valid until the
//! store change they approve has been applied.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tiergate_catalog::{CapabilityPath, CatalogError, PlanCatalog, TenantSubscription};
use tiergate_common::{AccessConfig, AdminCapabilities, PrincipalId, RoleId, TenantId};
use tiergate_logging::{log_access_event, AccessEventOutcome, LogContext};
use tiergate_security::{
    AccessMetrics, AssignmentSource, AuditLog, DataScope, GuardViolation, Principal,
    PrincipalDirectory, ProtectedEntityGuard, RbacError, Role, RoleStore,
};

use crate::cached::CachedResolver;
use crate::resolver::CapabilityPrefix;

/// Rejections and failures at the mutation boundary.
#[derive(Debug, Error)]
pub enum AdminError {
    /// A protected-entity rule blocked the mutation.
    #[error(transparent)]
    Guard(#[from] GuardViolation),
    /// The actor lacks the administrative capability.
    #[error("'{actor}' is not permitted to perform '{capability}'")]
    Forbidden {
        /// Acting principal.
        actor: PrincipalId,
        /// Capability that was checked.
        capability: CapabilityPath,
    },
    /// The target belongs to another tenant.
    #[error("'{actor}' cannot administer tenant '{tenant}'")]
    CrossTenant {
        /// Acting principal.
        actor: PrincipalId,
        /// Tenant of the target.
        tenant: TenantId,
    },
    /// The role does not exist.
    #[error("role not found: {0}")]
    UnknownRole(RoleId),
    /// A role with this identifier already exists.
    #[error("role already exists: {0}")]
    DuplicateRole(RoleId),
    /// The principal does not exist.
    #[error("principal not found: {0}")]
    UnknownPrincipal(PrincipalId),
    /// The role store rejected the mutation.
    #[error(transparent)]
    Rbac(#[from] RbacError),
    /// The plan catalog rejected the mutation.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The mutation was applied but could not be audited.
    #[error("audit log write failed: {0}")]
    Audit(String),
    /// A backing store failed while reading current state.
    #[error(transparent)]
    Store(#[from] tiergate_common::StoreError),
}

/// Parsed admin capability paths.
#[derive(Debug, Clone)]
struct AdminPaths {
    manage_roles: CapabilityPath,
    manage_users: CapabilityPath,
    manage_billing: CapabilityPath,
}

impl AdminPaths {
    fn parse(capabilities: &AdminCapabilities) -> Result<Self, CatalogError> {
        Ok(Self {
            manage_roles: capabilities.manage_roles.parse()?,
            manage_users: capabilities.manage_users.parse()?,
            manage_billing: capabilities.manage_billing.parse()?,
        })
    }
}

/// Administrative service wired to the in-memory stores.
#[derive(Clone)]
pub struct AccessAdministrator {
    roles: Arc<RoleStore>,
    directory: Arc<PrincipalDirectory>,
    plans: Arc<PlanCatalog>,
    guard: ProtectedEntityGuard,
    resolver: Arc<CachedResolver>,
    paths: AdminPaths,
    access: AccessConfig,
    audit: Option<Arc<AuditLog>>,
    metrics: Option<AccessMetrics>,
    mutations: Arc<Mutex<()>>,
}

impl AccessAdministrator {
    /// Wire the administrator. Fails when an admin capability path is malformed.
    pub fn new(
        roles: Arc<RoleStore>,
        directory: Arc<PrincipalDirectory>,
        plans: Arc<PlanCatalog>,
        guard: ProtectedEntityGuard,
        resolver: Arc<CachedResolver>,
        access: &AccessConfig,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            roles,
            directory,
            plans,
            guard,
            resolver,
            paths: AdminPaths::parse(&access.admin)?,
            access: access.clone(),
            audit: None,
            metrics: None,
            mutations: Arc::new(Mutex::new(())),
        })
    }

    /// Append every applied mutation to `audit`.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Count guard rejections on the given metrics.
    pub fn with_metrics(mut self, metrics: AccessMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create a role. Protected and super-admin roles cannot be created here.
    pub fn create_role(&self, actor: &Principal, role: Role) -> Result<(), AdminError> {
        let ctx = context(actor, "role.create");
        let _serial = self.serialize();
        let role = role.with_access_config(&self.access);
        self.check_unprivileged(&ctx, &role)?;
        self.ensure_role_tenant(actor, &role)?;
        self.authorize(actor, &self.paths.manage_roles)?;
        if self.roles.role(&role.id)?.is_some() {
            return Err(AdminError::DuplicateRole(role.id));
        }
        let target = role.id.to_string();
        let metadata = serde_json::json!({ "name": role.name, "scope": role.scope });
        self.roles.upsert_role(role);
        self.applied(&ctx, actor, &target, metadata)
    }

    /// Rename a role. Protected roles cannot be renamed and no role can take
    /// a protected name.
    pub fn rename_role(&self, actor: &Principal, role: &RoleId, name: &str) -> Result<(), AdminError> {
        let ctx = context(actor, "role.update");
        let _serial = self.serialize();
        let existing = self.role(role)?;
        self.guarded(&ctx, self.guard.check_role_update(&existing))?;
        let renamed = Role {
            name: name.to_owned(),
            ..existing.clone()
        }
        .with_access_config(&self.access);
        self.check_unprivileged(&ctx, &renamed)?;
        self.ensure_role_tenant(actor, &existing)?;
        self.authorize(actor, &self.paths.manage_roles)?;
        self.roles.upsert_role(renamed);
        self.applied(
            &ctx,
            actor,
            role.as_str(),
            serde_json::json!({ "from": existing.name, "to": name }),
        )
    }

    /// Replace the grants carried by a role.
    pub fn set_role_assignments(
        &self,
        actor: &Principal,
        role: &RoleId,
        grants: Vec<(CapabilityPath, DataScope)>,
    ) -> Result<(), AdminError> {
        let ctx = context(actor, "role.assignments");
        let _serial = self.serialize();
        let existing = self.role(role)?;
        self.guarded(&ctx, self.guard.check_role_update(&existing))?;
        self.ensure_role_tenant(actor, &existing)?;
        self.authorize(actor, &self.paths.manage_roles)?;
        let metadata = serde_json::json!({
            "grants": grants
                .iter()
                .map(|(path, scope)| format!("{path}:{scope}"))
                .collect::<Vec<_>>(),
        });
        self.roles.set_assignments(role, grants)?;
        self.invalidate(&self.roles.holders_of(role)?);
        self.applied(&ctx, actor, role.as_str(), metadata)
    }

    /// Delete a role and every membership of it.
    pub fn delete_role(&self, actor: &Principal, role: &RoleId) -> Result<(), AdminError> {
        let ctx = context(actor, "role.delete");
        let _serial = self.serialize();
        let existing = self.role(role)?;
        self.guarded(&ctx, self.guard.check_role_delete(&existing))?;
        self.ensure_role_tenant(actor, &existing)?;
        self.authorize(actor, &self.paths.manage_roles)?;
        let holders = self.roles.holders_of(role)?;
        self.roles.remove_role(role);
        self.invalidate(&holders);
        self.applied(
            &ctx,
            actor,
            role.as_str(),
            serde_json::json!({ "name": existing.name }),
        )
    }

    /// Give `target` a role.
    pub fn grant_role(&self, actor: &Principal, target: &PrincipalId, role: &RoleId) -> Result<(), AdminError> {
        let ctx = context(actor, "role.grant");
        let _serial = self.serialize();
        self.guarded(&ctx, self.guard.check_self_role_change(&actor.id, target))?;
        let target = self.principal(target)?;
        let existing = self.role(role)?;
        self.ensure_same_tenant(actor, target.tenant.as_ref())?;
        if let Some(tenant) = existing.tenant_id() {
            if target.tenant.as_ref() != Some(tenant) {
                return Err(AdminError::CrossTenant {
                    actor: actor.id.clone(),
                    tenant: tenant.clone(),
                });
            }
        }
        self.authorize(actor, &self.paths.manage_users)?;
        self.roles.grant_role(&target.id, role)?;
        self.resolver.invalidate_principal(&target);
        self.applied(
            &ctx,
            actor,
            target.id.as_str(),
            serde_json::json!({ "role": role }),
        )
    }

    /// Take a role away from `target`; never drops the last holder of a
    /// protected role.
    pub fn revoke_role(&self, actor: &Principal, target: &PrincipalId, role: &RoleId) -> Result<(), AdminError> {
        let ctx = context(actor, "role.revoke");
        let _serial = self.serialize();
        self.guarded(&ctx, self.guard.check_self_role_change(&actor.id, target))?;
        let existing = self.role(role)?;
        self.guarded(&ctx, self.guard.check_role_revoke(target, &existing))?;
        let target = self.principal(target)?;
        self.ensure_same_tenant(actor, target.tenant.as_ref())?;
        self.authorize(actor, &self.paths.manage_users)?;
        self.roles.revoke_role(&target.id, role);
        self.resolver.invalidate_principal(&target);
        self.applied(
            &ctx,
            actor,
            target.id.as_str(),
            serde_json::json!({ "role": role }),
        )
    }

    /// Delete a principal and its memberships.
    pub fn delete_principal(&self, actor: &Principal, target: &PrincipalId) -> Result<(), AdminError> {
        let ctx = context(actor, "principal.delete");
        let _serial = self.serialize();
        self.guarded(&ctx, self.guard.check_principal_delete(&actor.id, target))?;
        let target = self.principal(target)?;
        self.ensure_same_tenant(actor, target.tenant.as_ref())?;
        self.authorize(actor, &self.paths.manage_users)?;
        let held = self.roles.remove_principal(&target.id);
        self.directory.remove(&target.id);
        self.resolver.forget_principal(&target);
        self.applied(
            &ctx,
            actor,
            target.id.as_str(),
            serde_json::json!({ "roles": held }),
        )
    }

    /// Subscribe a tenant to a plan.
    pub fn subscribe(&self, actor: &Principal, subscription: TenantSubscription) -> Result<(), AdminError> {
        let ctx = context(actor, "subscription.create");
        let _serial = self.serialize();
        self.ensure_same_tenant(actor, Some(&subscription.tenant))?;
        self.authorize(actor, &self.paths.manage_billing)?;
        let tenant = subscription.tenant.clone();
        let metadata = serde_json::json!({
            "plan": subscription.plan,
            "starts_at": subscription.starts_at,
            "ends_at": subscription.ends_at,
        });
        self.plans.subscribe(subscription)?;
        self.resolver.invalidate_subscriptions(Some(&tenant));
        self.applied(&ctx, actor, tenant.as_str(), metadata)
    }

    /// End a tenant's open subscriptions to a plan at `at`.
    pub fn cancel_subscription(
        &self,
        actor: &Principal,
        tenant: &TenantId,
        plan: &str,
        at: DateTime<Utc>,
    ) -> Result<usize, AdminError> {
        let ctx = context(actor, "subscription.cancel");
        let _serial = self.serialize();
        self.ensure_same_tenant(actor, Some(tenant))?;
        self.authorize(actor, &self.paths.manage_billing)?;
        let closed = self.plans.cancel(tenant, plan, at);
        self.resolver.invalidate_subscriptions(Some(tenant));
        self.applied(
            &ctx,
            actor,
            tenant.as_str(),
            serde_json::json!({ "plan": plan, "closed": closed }),
        )?;
        Ok(closed)
    }

    /// Held from the first guard check until the mutation is applied.
    fn serialize(&self) -> MutexGuard<'_, ()> {
        self.mutations.lock()
    }

    fn role(&self, role: &RoleId) -> Result<Role, AdminError> {
        self.roles
            .role(role)?
            .ok_or_else(|| AdminError::UnknownRole(role.clone()))
    }

    fn principal(&self, id: &PrincipalId) -> Result<Principal, AdminError> {
        self.directory
            .get(id)
            .ok_or_else(|| AdminError::UnknownPrincipal(id.clone()))
    }

    fn authorize(&self, actor: &Principal, capability: &CapabilityPath) -> Result<(), AdminError> {
        let decision = self
            .resolver
            .decide(actor, &CapabilityPrefix::from_path(capability));
        if decision.is_allowed() {
            return Ok(());
        }
        let capability_label = capability.to_string();
        log_access_event(
            Some(&context(actor, "").with_capability(&capability_label)),
            "admin.authorize",
            &format!("administrative capability denied: {decision}"),
            AccessEventOutcome::Rejected,
        );
        Err(AdminError::Forbidden {
            actor: actor.id.clone(),
            capability: capability.clone(),
        })
    }

    /// Platform actors administer every tenant; tenant actors only their own.
    fn ensure_same_tenant(&self, actor: &Principal, tenant: Option<&TenantId>) -> Result<(), AdminError> {
        match (&actor.tenant, tenant) {
            (None, _) => Ok(()),
            (Some(own), Some(target)) if own == target => Ok(()),
            (Some(_), Some(target)) => Err(AdminError::CrossTenant {
                actor: actor.id.clone(),
                tenant: target.clone(),
            }),
            (Some(own), None) => Err(AdminError::CrossTenant {
                actor: actor.id.clone(),
                tenant: own.clone(),
            }),
        }
    }

    fn ensure_role_tenant(&self, actor: &Principal, role: &Role) -> Result<(), AdminError> {
        self.ensure_same_tenant(actor, role.tenant_id())
    }

    /// Runs after the mutation so concurrent readers cannot re-cache the old state.
    fn invalidate(&self, holders: &[PrincipalId]) {
        for holder in holders {
            if let Some(principal) = self.directory.get(holder) {
                self.resolver.invalidate_principal(&principal);
            }
        }
    }

    /// Protected and super-admin roles only come from the policy bundle.
    fn check_unprivileged(&self, ctx: &LogContext<'_>, role: &Role) -> Result<(), AdminError> {
        if role.super_admin {
            return Err(self.rejected(
                ctx,
                GuardViolation::ProtectedRoleUpdate {
                    role: role.name.clone(),
                },
            ));
        }
        self.guarded(ctx, self.guard.check_role_update(role))
    }

    fn guarded(&self, ctx: &LogContext<'_>, check: Result<(), GuardViolation>) -> Result<(), AdminError> {
        check.map_err(|violation| self.rejected(ctx, violation))
    }

    fn rejected(&self, ctx: &LogContext<'_>, violation: GuardViolation) -> AdminError {
        if let Some(metrics) = &self.metrics {
            metrics.inc_guard_violation();
        }
        log_access_event(
            Some(ctx),
            ctx.capability.unwrap_or("admin"),
            &violation.to_string(),
            AccessEventOutcome::Rejected,
        );
        AdminError::Guard(violation)
    }

    fn applied(
        &self,
        ctx: &LogContext<'_>,
        actor: &Principal,
        target: &str,
        metadata: serde_json::Value,
    ) -> Result<(), AdminError> {
        let event = ctx.capability.unwrap_or("admin");
        log_access_event(
            Some(ctx),
            event,
            &format!("{event} applied to '{target}'"),
            AccessEventOutcome::Applied,
        );
        if let Some(audit) = &self.audit {
            audit
                .append(&actor.id, actor.tenant.as_ref(), event, target, metadata)
                .map_err(|err| AdminError::Audit(format!("{err:#}")))?;
        }
        Ok(())
    }
}

fn context<'a>(actor: &'a Principal, event: &'a str) -> LogContext<'a> {
    let ctx = LogContext::new()
        .with_tenant(actor.tenant.as_ref().map_or("", TenantId::as_str))
        .with_principal(actor.id.as_str());
    if event.is_empty() {
        ctx
    } else {
        ctx.with_capability(event)
    }
}
