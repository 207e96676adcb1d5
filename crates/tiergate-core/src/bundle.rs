//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Access resolution and policy wiring."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
//! Declarative policy bundle: hierarchy, plans, subscriptions, roles and
//! principals in one TOML or YAML document.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tiergate_catalog::{
    load_document, CapabilityPath, HierarchyCatalog, HierarchyDefinition, ModuleDefinition, Plan,
    TenantSubscription,
};
use tiergate_common::RoleId;
use tiergate_security::{DataScope, Principal, Role};

fn default_scope() -> DataScope {
    DataScope::Own
}

/// One grant carried by a role in the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSpec {
    /// Action path.
    pub action: CapabilityPath,
    /// Data scope; defaults to `own`.
    #[serde(default = "default_scope")]
    pub scope: DataScope,
}

/// Role definition with its grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    #[serde(flatten)]
    pub role: Role,
    #[serde(default)]
    pub assignments: Vec<GrantSpec>,
}

/// Principal with the roles it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSpec {
    #[serde(flatten)]
    pub principal: Principal,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

/// Everything needed to stand up an engine without external stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyBundle {
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
    #[serde(default)]
    pub plans: Vec<Plan>,
    #[serde(default)]
    pub subscriptions: Vec<TenantSubscription>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    #[serde(default)]
    pub principals: Vec<PrincipalSpec>,
}

/// A role grant whose path is not in the bundle's hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingGrant {
    pub role: RoleId,
    pub action: CapabilityPath,
}

/// Summary printed after a bundle has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleReport {
    pub modules: usize,
    pub actions: usize,
    pub plans: usize,
    pub subscriptions: usize,
    pub roles: usize,
    pub principals: usize,
    pub dangling_grants: Vec<String>,
}

impl PolicyBundle {
    /// Load a bundle from a `.toml`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        load_document(path).with_context(|| format!("failed to load policy bundle {}", path.display()))
    }

    /// Hierarchy portion of the bundle.
    pub fn hierarchy(&self) -> HierarchyDefinition {
        HierarchyDefinition {
            modules: self.modules.clone(),
        }
    }

    /// Grants that reference paths missing from `catalog`.
    ///
    /// Dangling grants are tolerated at load time; they simply never match.
    pub fn dangling_grants(&self, catalog: &HierarchyCatalog) -> Vec<DanglingGrant> {
        self.roles
            .iter()
            .flat_map(|entry| {
                entry.assignments
                    .iter()
                    .filter(|grant| catalog.resolve(&grant.action).is_none())
                    .map(|grant| DanglingGrant {
                        role: entry.role.id.clone(),
                        action: grant.action.clone(),
                    })
            })
            .collect()
    }

    /// Build the hierarchy and summarise the bundle.
    pub fn validate(&self) -> Result<BundleReport> {
        let catalog =
            HierarchyCatalog::build(&self.hierarchy()).context("policy bundle hierarchy is invalid")?;
        Ok(BundleReport {
            modules: self.modules.len(),
            actions: catalog.action_count(),
            plans: self.plans.len(),
            subscriptions: self.subscriptions.len(),
            roles: self.roles.len(),
            principals: self.principals.len(),
            dangling_grants: self
                .dangling_grants(&catalog)
                .into_iter()
                .map(|grant| format!("{} -> {}", grant.role, grant.action))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"
[[modules]]
code = "core"
name = "Core"
requires_subscription = false

[[modules.submodules]]
code = "users"
name = "Users"

[[modules.submodules.components]]
code = "user_profile"
name = "Profile"

[[modules.submodules.components.actions]]
code = "edit"

[[roles]]
id = "employee"
name = "Employee"
scope = { tenant = "acme" }

[[roles.assignments]]
action = "core.users.user_profile.edit"

[[roles.assignments]]
action = "core.users.user_profile.archive"
scope = "all"

[[principals]]
id = "alice"
tenant = "acme"
roles = ["employee"]
"#;

    #[test]
    fn bundle_parses_with_flattened_roles_and_principals() {
        let bundle: PolicyBundle = toml::from_str(BUNDLE).unwrap();
        assert_eq!(bundle.roles[0].role.tenant_id().map(|t| t.as_str()), Some("acme"));
        assert_eq!(bundle.roles[0].assignments[0].scope, DataScope::Own);
        assert_eq!(bundle.principals[0].roles, vec![RoleId::from("employee")]);
        assert!(bundle.principals[0].principal.active);
    }

    #[test]
    fn validation_reports_dangling_grants() {
        let bundle: PolicyBundle = toml::from_str(BUNDLE).unwrap();
        let report = bundle.validate().unwrap();
        assert_eq!(report.actions, 1);
        assert_eq!(
            report.dangling_grants,
            vec!["employee -> core.users.user_profile.archive".to_string()]
        );
    }
}
