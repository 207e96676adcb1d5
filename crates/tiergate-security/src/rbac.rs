//! ---
//! tg_section: "04-security-access-control"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Role assignments, principals, and protected-entity rules."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiergate_catalog::CapabilityPath;
use tiergate_common::{AccessConfig, PrincipalId, RoleId, StoreError, TenantId};
use tracing::{debug, info};

/// Breadth of data a granted action covers.
///
/// Variants are declared from least to most permissive so that `Ord` picks
/// the widest grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataScope {
    /// Only records owned by the principal.
    Own,
    /// Records belonging to the principal's department.
    Department,
    /// Records belonging to the principal's team. Evaluated as `Department`.
    Team,
    /// Every record in the tenant.
    All,
}

impl DataScope {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataScope::Own => "own",
            DataScope::Department => "department",
            DataScope::Team => "team",
            DataScope::All => "all",
        }
    }

    /// Widest scope in the iterator, if any.
    pub fn most_permissive<I: IntoIterator<Item = DataScope>>(scopes: I) -> Option<DataScope> {
        scopes.into_iter().max()
    }
}

impl fmt::Display for DataScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a role applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleScope {
    /// Valid across every tenant.
    #[default]
    Platform,
    /// Local to one tenant.
    Tenant(TenantId),
}

/// Named bundle of action grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier.
    pub id: RoleId,
    /// Display name; also matched against configured protected names.
    pub name: String,
    /// Platform-wide or tenant-local.
    #[serde(default)]
    pub scope: RoleScope,
    /// Protected roles can never be edited, deleted or left without holders.
    #[serde(default)]
    pub protected: bool,
    /// Holders bypass entitlement and grant checks.
    #[serde(default)]
    pub super_admin: bool,
}

impl Role {
    /// Platform-wide role without flags.
    pub fn platform(id: impl Into<RoleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scope: RoleScope::Platform,
            protected: false,
            super_admin: false,
        }
    }

    /// Tenant-local role without flags.
    pub fn tenant(
        id: impl Into<RoleId>,
        name: impl Into<String>,
        tenant: impl Into<TenantId>,
    ) -> Self {
        Self {
            scope: RoleScope::Tenant(tenant.into()),
            ..Self::platform(id, name)
        }
    }

    /// Raise the protected and super-admin flags for configured role names.
    /// Super-admin roles are always protected.
    pub fn with_access_config(mut self, config: &AccessConfig) -> Self {
        if config.is_super_admin_name(&self.name) {
            self.super_admin = true;
        }
        if self.super_admin || config.protected_roles.iter().any(|name| name == &self.name) {
            self.protected = true;
        }
        self
    }

    /// Tenant owning the role, `None` for platform roles.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        match &self.scope {
            RoleScope::Platform => None,
            RoleScope::Tenant(tenant) => Some(tenant),
        }
    }
}

/// One (role, action, scope) grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Granting role.
    pub role: RoleId,
    /// Granted action.
    pub action: CapabilityPath,
    /// Data scope of the grant.
    pub scope: DataScope,
}

/// Errors raised by role store mutations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RbacError {
    /// Role not defined in the store.
    #[error("role not found: {0}")]
    UnknownRole(RoleId),
}

/// Read access to roles, their grants and their holders.
pub trait AssignmentSource: Send + Sync {
    /// Roles held by a principal.
    fn roles_of(&self, principal: &PrincipalId) -> Result<Vec<Role>, StoreError>;

    /// Role definition by id.
    fn role(&self, role: &RoleId) -> Result<Option<Role>, StoreError>;

    /// Grants carried by a role.
    fn assignments_of(&self, role: &RoleId) -> Result<Vec<RoleAssignment>, StoreError>;

    /// Principals holding a role.
    fn holders_of(&self, role: &RoleId) -> Result<Vec<PrincipalId>, StoreError>;
}

#[derive(Debug, Default)]
struct RoleState {
    roles: HashMap<RoleId, Role>,
    assignments: HashMap<RoleId, Vec<RoleAssignment>>,
    memberships: HashMap<PrincipalId, BTreeSet<RoleId>>,
}

/// In-memory role and membership store.
#[derive(Debug, Default)]
pub struct RoleStore {
    state: RwLock<RoleState>,
}

impl RoleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a role definition, keeping its grants and holders.
    pub fn upsert_role(&self, role: Role) {
        debug!(role = %role.id, name = %role.name, "role upserted");
        self.state.write().roles.insert(role.id.clone(), role);
    }

    /// Remove a role together with its grants and memberships.
    pub fn remove_role(&self, role: &RoleId) -> Option<Role> {
        let mut state = self.state.write();
        let removed = state.roles.remove(role)?;
        state.assignments.remove(role);
        for roles in state.memberships.values_mut() {
            roles.remove(role);
        }
        info!(role = %role, "role removed");
        Some(removed)
    }

    /// All role definitions, sorted by id.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = self.state.read().roles.values().cloned().collect::<Vec<_>>();
        roles.sort_by(|a, b| a.id.cmp(&b.id));
        roles
    }

    /// Lookup a role by display name.
    pub fn role_by_name(&self, name: &str) -> Option<Role> {
        self.state
            .read()
            .roles
            .values()
            .find(|role| role.name == name)
            .cloned()
    }

    /// Replace every grant carried by a role.
    pub fn set_assignments<I>(&self, role: &RoleId, grants: I) -> Result<(), RbacError>
    where
        I: IntoIterator<Item = (CapabilityPath, DataScope)>,
    {
        let mut state = self.state.write();
        if !state.roles.contains_key(role) {
            return Err(RbacError::UnknownRole(role.clone()));
        }
        let mut assignments = grants
            .into_iter()
            .map(|(action, scope)| RoleAssignment {
                role: role.clone(),
                action,
                scope,
            })
            .collect::<Vec<_>>();
        assignments.sort_by(|a, b| a.action.cmp(&b.action).then(a.scope.cmp(&b.scope)));
        assignments.dedup();
        info!(role = %role, grants = assignments.len(), "role assignments replaced");
        state.assignments.insert(role.clone(), assignments);
        Ok(())
    }

    /// Give a principal a role. Returns false if it was already held.
    pub fn grant_role(&self, principal: &PrincipalId, role: &RoleId) -> Result<bool, RbacError> {
        let mut state = self.state.write();
        if !state.roles.contains_key(role) {
            return Err(RbacError::UnknownRole(role.clone()));
        }
        let added = state
            .memberships
            .entry(principal.clone())
            .or_default()
            .insert(role.clone());
        if added {
            info!(principal = %principal, role = %role, "role granted");
        }
        Ok(added)
    }

    /// Take a role away from a principal. Returns false if it was not held.
    pub fn revoke_role(&self, principal: &PrincipalId, role: &RoleId) -> bool {
        let mut state = self.state.write();
        let removed = state
            .memberships
            .get_mut(principal)
            .map(|roles| roles.remove(role))
            .unwrap_or(false);
        if removed {
            info!(principal = %principal, role = %role, "role revoked");
        }
        removed
    }

    /// Drop every membership of a principal, returning the roles it held.
    pub fn remove_principal(&self, principal: &PrincipalId) -> Vec<RoleId> {
        self.state
            .write()
            .memberships
            .remove(principal)
            .map(|roles| roles.into_iter().collect())
            .unwrap_or_default()
    }
}

impl AssignmentSource for RoleStore {
    fn roles_of(&self, principal: &PrincipalId) -> Result<Vec<Role>, StoreError> {
        let state = self.state.read();
        Ok(state
            .memberships
            .get(principal)
            .into_iter()
            .flatten()
            .filter_map(|role| state.roles.get(role).cloned())
            .collect())
    }

    fn role(&self, role: &RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.state.read().roles.get(role).cloned())
    }

    fn assignments_of(&self, role: &RoleId) -> Result<Vec<RoleAssignment>, StoreError> {
        Ok(self
            .state
            .read()
            .assignments
            .get(role)
            .cloned()
            .unwrap_or_default())
    }

    fn holders_of(&self, role: &RoleId) -> Result<Vec<PrincipalId>, StoreError> {
        let mut holders = self
            .state
            .read()
            .memberships
            .iter()
            .filter(|(_, roles)| roles.contains(role))
            .map(|(principal, _)| principal.clone())
            .collect::<Vec<_>>();
        holders.sort();
        Ok(holders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> CapabilityPath {
        raw.parse().unwrap()
    }

    #[test]
    fn widest_scope_wins() {
        assert_eq!(
            DataScope::most_permissive([DataScope::Own, DataScope::Department]),
            Some(DataScope::Department)
        );
        assert_eq!(
            DataScope::most_permissive([DataScope::Team, DataScope::All, DataScope::Own]),
            Some(DataScope::All)
        );
        assert_eq!(DataScope::most_permissive([]), None);
    }

    #[test]
    fn configured_names_raise_flags() {
        let config = AccessConfig::default();
        let role = Role::platform("sa", "Super Administrator").with_access_config(&config);
        assert!(role.super_admin && role.protected);
        let role = Role::tenant("ta", "Tenant Administrator", "acme").with_access_config(&config);
        assert!(!role.super_admin && role.protected);
        let role = Role::tenant("emp", "Employee", "acme").with_access_config(&config);
        assert!(!role.super_admin && !role.protected);
    }

    #[test]
    fn memberships_and_grants_round_trip_through_store() {
        let store = RoleStore::new();
        store.upsert_role(Role::tenant("emp", "Employee", "acme"));
        store
            .set_assignments(
                &"emp".into(),
                [(path("core.users.user_profile.edit"), DataScope::Own)],
            )
            .unwrap();
        let alice = PrincipalId::from("alice");
        assert!(store.grant_role(&alice, &"emp".into()).unwrap());
        assert!(!store.grant_role(&alice, &"emp".into()).unwrap());

        let roles = store.roles_of(&alice).unwrap();
        assert_eq!(roles.len(), 1);
        let grants = store.assignments_of(&roles[0].id).unwrap();
        assert_eq!(grants[0].scope, DataScope::Own);
        assert_eq!(store.holders_of(&"emp".into()).unwrap(), vec![alice.clone()]);

        assert!(store.revoke_role(&alice, &"emp".into()));
        assert!(store.roles_of(&alice).unwrap().is_empty());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let store = RoleStore::new();
        let err = store
            .grant_role(&"alice".into(), &"ghost".into())
            .unwrap_err();
        assert_eq!(err, RbacError::UnknownRole("ghost".into()));
        assert!(store.set_assignments(&"ghost".into(), []).is_err());
    }

    #[test]
    fn removing_role_drops_memberships() {
        let store = RoleStore::new();
        store.upsert_role(Role::platform("ops", "Operations"));
        store.grant_role(&"bob".into(), &"ops".into()).unwrap();
        assert!(store.remove_role(&"ops".into()).is_some());
        assert!(store.roles_of(&"bob".into()).unwrap().is_empty());
        assert!(store.holders_of(&"ops".into()).unwrap().is_empty());
    }

    #[test]
    fn tenant_scope_deserializes_as_tagged_value() {
        #[derive(Deserialize)]
        struct Doc {
            roles: Vec<Role>,
        }
        let doc: Doc = serde_json::from_str(
            r#"{"roles":[{"id":"sa","name":"Super Administrator","super_admin":true},
                {"id":"emp","name":"Employee","scope":{"tenant":"acme"}}]}"#,
        )
        .unwrap();
        assert_eq!(doc.roles[0].scope, RoleScope::Platform);
        assert_eq!(doc.roles[1].tenant_id(), Some(&TenantId::from("acme")));
    }
}
