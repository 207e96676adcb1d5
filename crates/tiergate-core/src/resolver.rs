//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Access resolution and policy wiring."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
//! Composes entitlement, role grants and data scope into one decision.
//!
//! Every check follows the same order: load the principal's grants once,
//! apply the super-admin bypass, locate the request in the catalog, reject
//! inactive nodes, check the owning module's entitlement, then look for a
//! grant covering the request. Resolution only reads; any store failure
//! refuses the request.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tiergate_catalog::{
    ActionId, CapabilityPath, HierarchyCatalog, ModuleId, ModuleNode, PlanSource, SharedCatalog,
};
use tiergate_common::{AccessConfig, StoreError, UnknownCapabilityPolicy};
use tiergate_logging::{tg_debug, tg_warn, LogContext};
use tiergate_security::{AccessMetrics, AssignmentSource, DataScope, Principal, RoleAssignment};

use crate::decision::{Decision, DenialReason};
use crate::scope::{scope_allows, ScopedResource};

/// Everything a principal holds, loaded once per check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalGrants {
    /// Any applicable held role carries the super-admin flag.
    pub super_admin: bool,
    /// Union of grants across every applicable held role.
    pub assignments: Vec<RoleAssignment>,
}

impl PrincipalGrants {
    /// Widest scope granted for an exact action path.
    pub fn scope_for(&self, path: &CapabilityPath) -> Option<DataScope> {
        DataScope::most_permissive(
            self.assignments
                .iter()
                .filter(|assignment| &assignment.action == path)
                .map(|assignment| assignment.scope),
        )
    }
}

/// A capability path truncated at module, submodule, component or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityPrefix<'a> {
    /// Module code.
    pub module: &'a str,
    /// Submodule code.
    pub submodule: Option<&'a str>,
    /// Component code; requires `submodule`.
    pub component: Option<&'a str>,
    /// Action code; requires `component`.
    pub action: Option<&'a str>,
}

impl<'a> CapabilityPrefix<'a> {
    /// Prefix naming a module.
    pub fn module(module: &'a str) -> Self {
        Self {
            module,
            submodule: None,
            component: None,
            action: None,
        }
    }

    /// Prefix naming a submodule.
    pub fn submodule(module: &'a str, submodule: &'a str) -> Self {
        Self {
            submodule: Some(submodule),
            ..Self::module(module)
        }
    }

    /// Prefix naming a component.
    pub fn component(module: &'a str, submodule: &'a str, component: &'a str) -> Self {
        Self {
            component: Some(component),
            ..Self::submodule(module, submodule)
        }
    }

    /// Prefix naming an action.
    pub fn action(module: &'a str, submodule: &'a str, component: &'a str, action: &'a str) -> Self {
        Self {
            action: Some(action),
            ..Self::component(module, submodule, component)
        }
    }

    /// Borrow a full path as an action prefix.
    pub fn from_path(path: &'a CapabilityPath) -> Self {
        Self::action(&path.module, &path.submodule, &path.component, &path.action)
    }

    /// Parse one to four dot-separated segments.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let segments = raw.trim().split('.').collect::<Vec<_>>();
        if segments.iter().any(|segment| segment.is_empty()) {
            return None;
        }
        match *segments.as_slice() {
            [m] => Some(Self::module(m)),
            [m, s] => Some(Self::submodule(m, s)),
            [m, s, c] => Some(Self::component(m, s, c)),
            [m, s, c, a] => Some(Self::action(m, s, c, a)),
            _ => None,
        }
    }

    /// Whether a granted action lies beneath (or is) this prefix.
    pub fn covers(&self, path: &CapabilityPath) -> bool {
        path.module == self.module
            && self.submodule.map_or(true, |code| path.submodule == code)
            && self.component.map_or(true, |code| path.component == code)
            && self.action.map_or(true, |code| path.action == code)
    }

    /// Full path, when the prefix names an action.
    pub fn to_path(&self) -> Option<CapabilityPath> {
        Some(CapabilityPath::new(
            self.module,
            self.submodule?,
            self.component?,
            self.action?,
        ))
    }
}

impl std::fmt::Display for CapabilityPrefix<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.module)?;
        for segment in [self.submodule, self.component, self.action].into_iter().flatten() {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

struct Located {
    module: ModuleId,
    active: bool,
}

fn locate(catalog: &HierarchyCatalog, prefix: &CapabilityPrefix<'_>) -> Option<Located> {
    let module = catalog.find_module(prefix.module)?;
    let Some(sub_code) = prefix.submodule else {
        return Some(Located {
            module,
            active: catalog.module(module).active,
        });
    };
    let submodule = catalog.find_submodule(prefix.module, sub_code)?;
    let Some(component_code) = prefix.component else {
        return Some(Located {
            module,
            active: catalog.module(module).active && catalog.submodule(submodule).active,
        });
    };
    let component = catalog.find_component(prefix.module, sub_code, component_code)?;
    let Some(action_code) = prefix.action else {
        return Some(Located {
            module,
            active: catalog.module(module).active
                && catalog.submodule(submodule).active
                && catalog.component(component).active,
        });
    };
    let action = catalog.find_action(prefix.module, sub_code, component_code, action_code)?;
    Some(Located {
        module,
        active: catalog.is_chain_active(action),
    })
}

/// Navigation entry for a reachable component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuComponent {
    /// Component code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// View identifier.
    pub view: Option<String>,
}

/// Navigation entry for a reachable submodule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSubModule {
    /// Submodule code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Reachable components in priority order.
    pub components: Vec<MenuComponent>,
}

/// Navigation entry for a reachable module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuModule {
    /// Module code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Routing prefix.
    pub route_prefix: Option<String>,
    /// Reachable submodules in priority order.
    pub submodules: Vec<MenuSubModule>,
}

/// Read-path authorization engine.
///
/// Built once with handles to its backing stores and shared with every
/// caller.
#[derive(Clone)]
pub struct AccessResolver {
    catalog: SharedCatalog,
    plans: Arc<dyn PlanSource>,
    assignments: Arc<dyn AssignmentSource>,
    unknown_capability: UnknownCapabilityPolicy,
    metrics: Option<AccessMetrics>,
}

impl AccessResolver {
    /// Wire the resolver to its stores.
    pub fn new(
        catalog: SharedCatalog,
        plans: Arc<dyn PlanSource>,
        assignments: Arc<dyn AssignmentSource>,
        config: &AccessConfig,
    ) -> Self {
        Self {
            catalog,
            plans,
            assignments,
            unknown_capability: config.unknown_capability,
            metrics: None,
        }
    }

    /// Record decisions on the given metrics.
    pub fn with_metrics(mut self, metrics: AccessMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Catalog handle the resolver reads.
    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Load the grants of every role applicable to the principal.
    ///
    /// Tenant-local roles only apply to principals of the same tenant.
    pub fn grants(&self, principal: &Principal) -> Result<PrincipalGrants, StoreError> {
        let mut grants = PrincipalGrants::default();
        let mut seen = HashSet::new();
        for role in self.assignments.roles_of(&principal.id)? {
            if let Some(tenant) = role.tenant_id() {
                if principal.tenant.as_ref() != Some(tenant) {
                    continue;
                }
            }
            grants.super_admin |= role.super_admin;
            for assignment in self.assignments.assignments_of(&role.id)? {
                if seen.insert((assignment.action.clone(), assignment.scope)) {
                    grants.assignments.push(assignment);
                }
            }
        }
        Ok(grants)
    }

    /// Module check with the denial reason.
    pub fn decide_module(&self, principal: &Principal, module: &str) -> Decision {
        self.decide(principal, &CapabilityPrefix::module(module))
    }

    /// Submodule check with the denial reason.
    pub fn decide_submodule(&self, principal: &Principal, module: &str, submodule: &str) -> Decision {
        self.decide(principal, &CapabilityPrefix::submodule(module, submodule))
    }

    /// Component check with the denial reason.
    pub fn decide_component(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
    ) -> Decision {
        self.decide(
            principal,
            &CapabilityPrefix::component(module, submodule, component),
        )
    }

    /// Action check with the denial reason.
    pub fn decide_action(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
        action: &str,
    ) -> Decision {
        self.decide(
            principal,
            &CapabilityPrefix::action(module, submodule, component, action),
        )
    }

    /// Action check followed, when a resource is given, by the scope check.
    pub fn decide_action_with_scope(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
        action: &str,
        resource: Option<&dyn ScopedResource>,
    ) -> Decision {
        let prefix = CapabilityPrefix::action(module, submodule, component, action);
        let decision = match self.grants(principal) {
            Ok(grants) => {
                let decision = self.evaluate(principal, &grants, &prefix);
                match (decision, resource) {
                    (Decision::Allowed, Some(resource)) if !grants.super_admin => {
                        let scope = prefix.to_path().and_then(|path| grants.scope_for(&path));
                        match scope {
                            Some(scope) if scope_allows(scope, principal, resource) => {
                                Decision::Allowed
                            }
                            _ => Decision::Denied(DenialReason::Scope),
                        }
                    }
                    (decision, _) => decision,
                }
            }
            Err(err) => self.store_failure(principal, &prefix, &err),
        };
        self.record(principal, &prefix, decision);
        decision
    }

    /// `canAccessModule`.
    pub fn can_access_module(&self, principal: &Principal, module: &str) -> bool {
        self.decide_module(principal, module).is_allowed()
    }

    /// `canAccessSubModule`.
    pub fn can_access_submodule(&self, principal: &Principal, module: &str, submodule: &str) -> bool {
        self.decide_submodule(principal, module, submodule).is_allowed()
    }

    /// `canAccessComponent`.
    pub fn can_access_component(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
    ) -> bool {
        self.decide_component(principal, module, submodule, component)
            .is_allowed()
    }

    /// `canPerformAction`.
    pub fn can_perform_action(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
        action: &str,
    ) -> bool {
        self.decide_action(principal, module, submodule, component, action)
            .is_allowed()
    }

    /// `canPerformActionWithScope`.
    pub fn can_perform_action_with_scope(
        &self,
        principal: &Principal,
        module: &str,
        submodule: &str,
        component: &str,
        action: &str,
        resource: Option<&dyn ScopedResource>,
    ) -> bool {
        self.decide_action_with_scope(principal, module, submodule, component, action, resource)
            .is_allowed()
    }

    /// `getUserAccessScope`: the widest scope granted for an action.
    ///
    /// Super-admins get [`DataScope::All`]. `None` when nothing matches,
    /// when the id does not belong to the current catalog snapshot, or when
    /// a store fails.
    pub fn get_user_access_scope(&self, principal: &Principal, action: ActionId) -> Option<DataScope> {
        let path = self.catalog.snapshot().path_of(action)?;
        self.scope_for_path(principal, &path)
    }

    /// Widest scope granted for an action path.
    pub fn scope_for_path(&self, principal: &Principal, path: &CapabilityPath) -> Option<DataScope> {
        match self.grants(principal) {
            Ok(grants) if grants.super_admin => Some(DataScope::All),
            Ok(grants) => grants.scope_for(path),
            Err(err) => {
                self.store_failure(principal, &CapabilityPrefix::from_path(path), &err);
                None
            }
        }
    }

    /// Decision for any prefix depth.
    pub fn decide(&self, principal: &Principal, prefix: &CapabilityPrefix<'_>) -> Decision {
        let decision = match self.grants(principal) {
            Ok(grants) => self.evaluate(principal, &grants, prefix),
            Err(err) => self.store_failure(principal, prefix, &err),
        };
        self.record(principal, prefix, decision);
        decision
    }

    /// Modules, submodules and components the principal can reach, in
    /// priority order.
    pub fn accessible_modules(&self, principal: &Principal) -> Result<Vec<MenuModule>, StoreError> {
        let grants = self.grants(principal)?;
        let catalog = self.catalog.snapshot();
        let entitled = match (&principal.tenant, grants.super_admin) {
            (_, true) | (None, false) => BTreeSet::new(),
            (Some(tenant), false) => self.plans.entitled_modules(tenant, Utc::now())?,
        };
        let granted = grants
            .assignments
            .iter()
            .filter_map(|assignment| catalog.resolve(&assignment.action))
            .filter(|action| catalog.is_chain_active(*action))
            .collect::<HashSet<_>>();
        let reachable = |action: ActionId| grants.super_admin || granted.contains(&action);

        let mut menu = Vec::new();
        for module_id in catalog.modules() {
            let module = catalog.module(module_id);
            if !module.active {
                continue;
            }
            let is_entitled = grants.super_admin
                || !module.requires_subscription
                || entitled.contains(&module.code);
            if !is_entitled {
                continue;
            }
            let mut submodules = Vec::new();
            for submodule_id in catalog.submodules_of(module_id) {
                let submodule = catalog.submodule(submodule_id);
                if !submodule.active {
                    continue;
                }
                let components = catalog
                    .components_of(submodule_id)
                    .filter(|component_id| {
                        catalog.component(*component_id).active
                            && catalog
                                .actions_of(*component_id)
                                .any(|action| catalog.is_chain_active(action) && reachable(action))
                    })
                    .map(|component_id| {
                        let component = catalog.component(component_id);
                        MenuComponent {
                            code: component.code.clone(),
                            name: component.name.clone(),
                            view: component.view.clone(),
                        }
                    })
                    .collect::<Vec<_>>();
                if !components.is_empty() {
                    submodules.push(MenuSubModule {
                        code: submodule.code.clone(),
                        name: submodule.name.clone(),
                        components,
                    });
                }
            }
            if !submodules.is_empty() {
                menu.push(MenuModule {
                    code: module.code.clone(),
                    name: module.name.clone(),
                    route_prefix: module.route_prefix.clone(),
                    submodules,
                });
            }
        }
        Ok(menu)
    }

    fn evaluate(
        &self,
        principal: &Principal,
        grants: &PrincipalGrants,
        prefix: &CapabilityPrefix<'_>,
    ) -> Decision {
        if grants.super_admin {
            return Decision::Allowed;
        }
        let catalog = self.catalog.snapshot();
        let Some(located) = locate(&catalog, prefix) else {
            return self.unknown_capability(principal, prefix);
        };
        if !located.active {
            return Decision::Denied(DenialReason::Inactive);
        }
        match self.entitled(principal, catalog.module(located.module)) {
            Ok(true) => {}
            Ok(false) => return Decision::Denied(DenialReason::Entitlement),
            Err(err) => return self.store_failure(principal, prefix, &err),
        }
        let granted = grants.assignments.iter().any(|assignment| {
            prefix.covers(&assignment.action)
                && catalog
                    .resolve(&assignment.action)
                    .is_some_and(|action| catalog.is_chain_active(action))
        });
        if granted {
            Decision::Allowed
        } else {
            Decision::Denied(DenialReason::Grant)
        }
    }

    fn entitled(&self, principal: &Principal, module: &ModuleNode) -> Result<bool, StoreError> {
        if !module.requires_subscription {
            return Ok(true);
        }
        let Some(tenant) = &principal.tenant else {
            return Ok(false);
        };
        Ok(self
            .plans
            .entitled_modules(tenant, Utc::now())?
            .contains(&module.code))
    }

    fn unknown_capability(&self, principal: &Principal, prefix: &CapabilityPrefix<'_>) -> Decision {
        let capability = prefix.to_string();
        let ctx = context(principal, &capability);
        match self.unknown_capability {
            UnknownCapabilityPolicy::Deny => {
                tg_warn!(context = ctx, "capability not found in catalog, denying");
                Decision::Denied(DenialReason::UnknownCapability)
            }
            UnknownCapabilityPolicy::Allow => {
                tg_warn!(
                    context = ctx,
                    "capability not found in catalog, allowing under legacy policy"
                );
                Decision::Allowed
            }
        }
    }

    fn store_failure(
        &self,
        principal: &Principal,
        prefix: &CapabilityPrefix<'_>,
        err: &StoreError,
    ) -> Decision {
        let capability = prefix.to_string();
        tg_warn!(
            context = context(principal, &capability),
            "backing store failed during resolution, denying: {err}"
        );
        Decision::Denied(DenialReason::StoreUnavailable)
    }

    fn record(&self, principal: &Principal, prefix: &CapabilityPrefix<'_>, decision: Decision) {
        if let Decision::Denied(reason) = decision {
            let capability = prefix.to_string();
            tg_debug!(
                context = context(principal, &capability),
                "access denied: {reason}"
            );
        }
        if let Some(metrics) = &self.metrics {
            match decision {
                Decision::Allowed => metrics.inc_allowed(),
                Decision::Denied(reason) => metrics.inc_denied(reason.label()),
            }
        }
    }
}

fn context<'a>(principal: &'a Principal, capability: &'a str) -> LogContext<'a> {
    LogContext::new()
        .with_tenant(principal.tenant.as_ref().map_or("", |tenant| tenant.as_str()))
        .with_principal(principal.id.as_str())
        .with_capability(capability)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_parse_at_every_depth() {
        let prefix = CapabilityPrefix::parse("core.users").unwrap();
        assert_eq!(prefix, CapabilityPrefix::submodule("core", "users"));
        assert_eq!(prefix.to_string(), "core.users");
        assert!(prefix.to_path().is_none());

        let prefix = CapabilityPrefix::parse("core.users.user_profile.edit").unwrap();
        assert_eq!(
            prefix.to_path(),
            Some(CapabilityPath::new("core", "users", "user_profile", "edit"))
        );
        assert!(CapabilityPrefix::parse("core..x").is_none());
        assert!(CapabilityPrefix::parse("a.b.c.d.e").is_none());
        assert!(CapabilityPrefix::parse("").is_none());
    }

    #[test]
    fn prefix_covers_descendant_paths_only() {
        let path = CapabilityPath::new("core", "users", "user_profile", "edit");
        assert!(CapabilityPrefix::module("core").covers(&path));
        assert!(CapabilityPrefix::component("core", "users", "user_profile").covers(&path));
        assert!(!CapabilityPrefix::submodule("core", "settings").covers(&path));
        assert!(!CapabilityPrefix::module("hr").covers(&path));
    }
}
